//! Server configuration, loaded from a TOML file with CLI overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use secrecy::SecretString;
use serde::Deserialize;
use webterm_relay::keys::default_key_dirs;
use webterm_relay::SessionOptions;
use webterm_types::ControlChannelMode;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Host inventory file.
    pub inventory: PathBuf,
    /// How terminal clients authenticate; see [`ControlChannelMode`].
    pub control_channel: ControlChannelMode,
    /// Accepted access tokens. Empty means nobody can connect.
    pub tokens: Vec<SecretString>,
    pub dial_timeout_secs: u64,
    pub keepalive_secs: u64,
    /// Unanswered keepalive probes tolerated before declaring a session dead.
    pub keepalive_max: usize,
    /// Overrides the default key directories for keyless hosts.
    pub local_key_dirs: Option<Vec<PathBuf>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            inventory: PathBuf::from("hosts.toml"),
            control_channel: ControlChannelMode::default(),
            tokens: Vec::new(),
            dial_timeout_secs: 15,
            keepalive_secs: 30,
            keepalive_max: 1,
            local_key_dirs: None,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            dial_timeout: Duration::from_secs(self.dial_timeout_secs),
            keepalive_interval: Duration::from_secs(self.keepalive_secs),
            keepalive_max: self.keepalive_max,
            local_key_dirs: self
                .local_key_dirs
                .clone()
                .unwrap_or_else(default_key_dirs),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
