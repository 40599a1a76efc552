//! Seam between the relay core and whatever stores host inventory.

use async_trait::async_trait;
use webterm_types::{ConnectionTarget, Credential};

use crate::error::RelayResult;

/// Maps a host identifier to connection parameters and an authentication
/// strategy. Implemented by the surrounding system (a config file, a CMDB);
/// the relay core only consumes it.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolve one host. Returns [`crate::RelayError::NotFound`] for unknown
    /// hosts and [`crate::RelayError::NoAuthMethod`] when the entry carries
    /// nothing usable.
    async fn resolve(&self, host_id: &str) -> RelayResult<(ConnectionTarget, Credential)>;
}
