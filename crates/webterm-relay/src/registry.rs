//! Book-keeping for live relays.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::Utc;
use tracing::{info, warn};
use webterm_types::{ConnectionTarget, RelaySummary};

use crate::error::RelayError;

/// Tracks every relay currently bridging a client, so the admin surface can
/// list and count them, and writes the audit line when one finishes.
#[derive(Default)]
pub struct RelayRegistry {
    next_id: AtomicU64,
    active: RwLock<HashMap<u64, RelaySummary>>,
}

impl RelayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a relay going active and return its id.
    pub fn register(&self, host_id: &str, target: &ConnectionTarget) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let summary = RelaySummary {
            id,
            host_id: host_id.to_string(),
            address: target.address(),
            username: target.username.clone(),
            opened_at: Utc::now(),
        };
        info!(relay = id, host = %summary.address, user = %summary.username, "relay opened");
        self.active
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, summary);
        id
    }

    /// Drop a finished relay and write the audit line. Unknown ids are
    /// ignored so every teardown path may call this unconditionally.
    pub fn finish(&self, id: u64, error: Option<&RelayError>) {
        let removed = self
            .active
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        let Some(summary) = removed else { return };
        match error {
            None => info!(relay = id, host = %summary.address, "relay closed cleanly"),
            Some(err) => {
                warn!(relay = id, host = %summary.address, error = %err, "relay closed with error");
            }
        }
    }

    /// Snapshot of live relays, oldest id first.
    pub fn active(&self) -> Vec<RelaySummary> {
        let mut entries: Vec<_> = self
            .active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        entries.sort_by_key(|s| s.id);
        entries
    }

    pub fn count(&self) -> usize {
        self.active.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
