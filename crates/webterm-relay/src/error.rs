//! Error taxonomy shared by the session and relay layers.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// The TCP/SSH handshake to the target host failed.
    #[error("failed to reach {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: russh::Error,
    },

    /// The target host did not answer within the dial deadline.
    #[error("connection to {address} timed out after {timeout:?}")]
    DialTimeout { address: String, timeout: Duration },

    /// The credential was rejected by the host or could not be used at all
    /// (unparsable key, wrong passphrase).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The inventory entry for the host carries no usable credential.
    #[error("no authentication method configured for this host")]
    NoAuthMethod,

    /// Keyless mode found nothing parseable in the operator key directories.
    #[error("no usable local private key found for keyless host")]
    NoLocalKey,

    /// PTY allocation or shell startup was refused after authentication.
    #[error("pty allocation or shell start failed: {0}")]
    Pty(#[source] russh::Error),

    /// The established session died underneath us.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The client sent something the relay protocol forbids.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A named resource (host, credential) does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    /// A required connection parameter is missing.
    #[error("{field} must not be empty or zero")]
    EmptyField { field: &'static str },

    #[error("ssh error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    pub fn not_found(kind: &str, name: impl Into<String>) -> Self {
        RelayError::NotFound {
            kind: kind.to_string(),
            name: name.into(),
        }
    }

    /// True for faults that mean the remote side is gone rather than a caller
    /// mistake; the web layer maps these to a different close code.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RelayError::Transport(_) | RelayError::Dial { .. } | RelayError::DialTimeout { .. }
        )
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
