//! Control messages embedded in the client-to-server stream.
//!
//! The browser multiplexes structured control frames (window resizes, the
//! pre-session auth handshake) onto the same WebSocket that carries raw
//! terminal keystrokes. A frame is only treated as control if it announces a
//! recognized `type`; everything else is opaque terminal input and must be
//! forwarded byte-for-byte.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured message recognized on the client stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Window geometry change; applied to the PTY, never forwarded.
    Resize { cols: u16, rows: u16 },
    /// Pre-session authentication handshake (see [`ControlChannelMode`]).
    Auth { token: String },
}

/// A frame that announced a control `type` but could not be decoded as one.
/// Callers log this and forward the bytes as raw data instead of dropping
/// them, so terminal input that merely looks structured is never eaten.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlParseError {
    pub reason: String,
}

impl std::fmt::Display for ControlParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed control message: {}", self.reason)
    }
}

impl std::error::Error for ControlParseError {}

impl ControlMessage {
    /// Classify one client frame.
    ///
    /// - `Ok(Some(msg))`: a well-formed control message.
    /// - `Ok(None)`: raw terminal data, including valid JSON that carries no
    ///   `type` tag.
    /// - `Err(_)`: the frame claims to be a control message but is malformed
    ///   or of an unknown type.
    pub fn parse(raw: &[u8]) -> Result<Option<ControlMessage>, ControlParseError> {
        let trimmed = raw.iter().position(|b| !b.is_ascii_whitespace());
        match trimmed {
            Some(idx) if raw[idx] == b'{' => {}
            _ => return Ok(None),
        }

        let value: Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            // Not JSON after all; treat as keystrokes that start with '{'.
            Err(_) => return Ok(None),
        };
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Ok(None);
        };

        match kind {
            "resize" | "auth" => serde_json::from_value(value.clone()).map(Some).map_err(|err| {
                ControlParseError {
                    reason: format!("bad '{kind}' payload: {err}"),
                }
            }),
            other => Err(ControlParseError {
                reason: format!("unknown control type '{other}'"),
            }),
        }
    }
}

/// How the client proves who it is on the terminal socket.
///
/// The original system ran both shapes side by side on different endpoints;
/// they are two configurations of the same relay, not a legacy/modern pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlChannelMode {
    /// Token arrives out of band (query string or Authorization header)
    /// before the upgrade; the stream carries only resize control frames.
    Inline,
    /// The first frame after the upgrade must be `{"type":"auth","token":..}`
    /// and is consumed before any session is opened.
    AuthHandshake,
}

impl Default for ControlChannelMode {
    fn default() -> Self {
        ControlChannelMode::Inline
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod control_tests;
