//! Connection target description for a managed host.

use serde::{Deserialize, Serialize};

/// Smallest PTY geometry we will ever request. A degenerate 0x0 terminal
/// makes most remote shells misbehave, so anything below this floor is
/// clamped up to it.
pub const MIN_PTY_COLS: u16 = 80;
pub const MIN_PTY_ROWS: u16 = 24;

fn default_term() -> String {
    "xterm-256color".to_string()
}

fn default_port() -> u16 {
    22
}

/// Where and how to reach one host's shell, minus the credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// Host address (IP or resolvable name).
    pub host: String,
    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Remote username.
    pub username: String,
    /// Terminal type requested for the PTY.
    #[serde(default = "default_term")]
    pub term: String,
    /// Requested initial terminal width in columns (0 = use the floor).
    #[serde(default)]
    pub width: u16,
    /// Requested initial terminal height in rows (0 = use the floor).
    #[serde(default)]
    pub height: u16,
}

impl ConnectionTarget {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            term: default_term(),
            width: 0,
            height: 0,
        }
    }

    /// Effective PTY geometry: the requested size clamped to the 80x24 floor.
    pub fn pty_size(&self) -> (u16, u16) {
        (self.width.max(MIN_PTY_COLS), self.height.max(MIN_PTY_ROWS))
    }

    /// `host:port` for dialing and log lines.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check the fields a session cannot be opened without. Returns the name
    /// of the first offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.host.trim().is_empty() {
            return Err("host");
        }
        if self.port == 0 {
            return Err("port");
        }
        if self.username.trim().is_empty() {
            return Err("username");
        }
        if self.term.trim().is_empty() {
            return Err("term");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod target_tests;
