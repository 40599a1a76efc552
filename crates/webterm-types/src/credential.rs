//! Authentication strategies for reaching a managed host.

use secrecy::SecretString;
use serde::Deserialize;

/// One resolved way to authenticate a session. The resolver guarantees a host
/// maps to exactly one variant; the session layer never retries across
/// strategies.
///
/// Secrets are wrapped in [`SecretString`] so they stay redacted in Debug
/// output and are zeroized on drop; nothing in this crate logs them.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Credential {
    /// Plain password authentication.
    Password {
        password: SecretString,
    },
    /// Private key material (OpenSSH or PKCS#8 PEM), optionally encrypted.
    PrivateKey {
        key: SecretString,
        #[serde(default)]
        passphrase: Option<SecretString>,
    },
    /// No caller-supplied secret: the relay host trusts a key already
    /// provisioned on this server, looked up from the operator's key
    /// directories at open time.
    KeylessLocal,
}

impl Credential {
    /// Short method name for log lines.
    pub fn method(&self) -> &'static str {
        match self {
            Credential::Password { .. } => "password",
            Credential::PrivateKey { .. } => "private_key",
            Credential::KeylessLocal => "keyless_local",
        }
    }
}
