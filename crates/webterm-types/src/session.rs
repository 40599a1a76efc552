//! Session registry DTOs exposed over the admin API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One live relay as reported by the registry listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySummary {
    /// Registry-assigned identifier, unique for the server's lifetime.
    pub id: u64,
    /// Inventory identifier the client asked for.
    pub host_id: String,
    /// Resolved `host:port` the session is attached to.
    pub address: String,
    /// Remote username.
    pub username: String,
    /// When the relay went active.
    pub opened_at: DateTime<Utc>,
}
