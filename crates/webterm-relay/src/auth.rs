//! Credential preparation and SSH authentication.
//!
//! Material is resolved *before* any socket is opened so that a bad key or a
//! missing local key never leaves a half-dialed connection behind.

use std::path::PathBuf;
use std::sync::Arc;

use russh::client;
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg};
use secrecy::ExposeSecret;
use tracing::debug;
use webterm_types::Credential;

use crate::error::{RelayError, RelayResult};
use crate::keys;

pub(crate) enum AuthMaterial {
    Password(String),
    Key(PrivateKey),
}

/// Turn an inventory credential into something the SSH client can present.
/// Fails fast on unparsable keys and absent local keys.
pub(crate) fn prepare(
    credential: &Credential,
    local_key_dirs: &[PathBuf],
) -> RelayResult<AuthMaterial> {
    match credential {
        Credential::Password { password } => {
            Ok(AuthMaterial::Password(password.expose_secret().to_string()))
        }
        Credential::PrivateKey { key, passphrase } => {
            let passphrase = passphrase.as_ref().map(|p| p.expose_secret());
            let key = keys::load_private_key(key.expose_secret(), passphrase)?;
            Ok(AuthMaterial::Key(key))
        }
        Credential::KeylessLocal => Ok(AuthMaterial::Key(keys::find_local_key(local_key_dirs)?)),
    }
}

fn ensure_success(result: client::AuthResult, method: &str) -> RelayResult<()> {
    match result {
        client::AuthResult::Success => Ok(()),
        client::AuthResult::Failure { .. } => Err(RelayError::Auth(format!(
            "{method} authentication rejected by host"
        ))),
    }
}

pub(crate) async fn authenticate<H: client::Handler>(
    handle: &mut client::Handle<H>,
    username: &str,
    material: AuthMaterial,
) -> RelayResult<()> {
    match material {
        AuthMaterial::Password(password) => {
            let result = handle.authenticate_password(username, password).await?;
            ensure_success(result, "password")
        }
        AuthMaterial::Key(key) => {
            // Servers that support rsa-sha2 reject the legacy ssh-rsa
            // signature, so honor the advertised preference for RSA keys.
            let hash_alg = if key.algorithm().is_rsa() {
                handle.best_supported_rsa_hash().await.unwrap_or(None).flatten()
            } else {
                None
            };
            debug!(user = username, ?hash_alg, "attempting publickey authentication");
            let result = handle
                .authenticate_publickey(
                    username.to_string(),
                    PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                )
                .await?;
            ensure_success(result, "publickey")
        }
    }
}
