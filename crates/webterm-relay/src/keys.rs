//! Private key parsing and local key discovery for keyless hosts.

use std::path::PathBuf;

use russh::keys::{decode_secret_key, PrivateKey};
use tracing::debug;

use crate::error::{RelayError, RelayResult};

/// File names probed in each key directory, in preference order.
const LOCAL_KEY_NAMES: [&str; 3] = ["id_rsa", "id_ed25519", "id_ecdsa"];

/// Directories searched for a usable key when a host is configured keyless:
/// the current user's `~/.ssh` first, then the daemon account's.
pub fn default_key_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(PathBuf::from(home).join(".ssh"));
    }
    let root = PathBuf::from("/root/.ssh");
    if !dirs.contains(&root) {
        dirs.push(root);
    }
    dirs
}

/// Parse PEM/OpenSSH key material, decrypting with `passphrase` if given.
pub fn load_private_key(data: &str, passphrase: Option<&str>) -> RelayResult<PrivateKey> {
    decode_secret_key(data, passphrase)
        .map_err(|err| RelayError::Auth(format!("unable to parse private key: {err}")))
}

/// Scan `dirs` for the first parseable private key. Unreadable or encrypted
/// files are skipped with a debug line rather than failing the whole scan.
pub fn find_local_key(dirs: &[PathBuf]) -> RelayResult<PrivateKey> {
    for dir in dirs {
        for name in LOCAL_KEY_NAMES {
            let path = dir.join(name);
            let Ok(data) = std::fs::read_to_string(&path) else {
                continue;
            };
            match decode_secret_key(&data, None) {
                Ok(key) => {
                    debug!(path = %path.display(), "using local key for keyless host");
                    return Ok(key);
                }
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping unusable local key");
                }
            }
        }
    }
    Err(RelayError::NoLocalKey)
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod keys_tests;
