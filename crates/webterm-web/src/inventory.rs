//! File-backed host inventory.
//!
//! The inventory is a TOML file mapping host identifiers to connection
//! parameters and one credential each:
//!
//! ```toml
//! [hosts.web-1]
//! host = "10.0.0.5"
//! username = "ops"
//! method = "password"
//! password = "hunter2"
//!
//! [hosts.bastion]
//! host = "10.0.0.1"
//! port = 2222
//! username = "root"
//! method = "keyless_local"
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use webterm_relay::{CredentialResolver, RelayError, RelayResult};
use webterm_types::{ConnectionTarget, Credential};

#[derive(Debug, Deserialize)]
struct HostEntry {
    #[serde(flatten)]
    target: ConnectionTarget,
    #[serde(flatten)]
    credential: Option<Credential>,
}

#[derive(Debug, Default, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    hosts: HashMap<String, HostEntry>,
}

/// In-memory snapshot of the inventory file, loaded once at startup.
pub struct FileInventory {
    hosts: HashMap<String, HostEntry>,
}

impl FileInventory {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let file: InventoryFile = toml::from_str(raw).context("parsing inventory")?;
        for (id, entry) in &file.hosts {
            if let Err(field) = entry.target.validate() {
                anyhow::bail!("host '{id}': {field} must not be empty or zero");
            }
        }
        Ok(Self { hosts: file.hosts })
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[async_trait]
impl CredentialResolver for FileInventory {
    async fn resolve(&self, host_id: &str) -> RelayResult<(ConnectionTarget, Credential)> {
        let entry = self
            .hosts
            .get(host_id)
            .ok_or_else(|| RelayError::not_found("host", host_id))?;
        let credential = entry.credential.clone().ok_or(RelayError::NoAuthMethod)?;
        Ok((entry.target.clone(), credential))
    }
}

#[cfg(test)]
#[path = "inventory_tests.rs"]
mod inventory_tests;
