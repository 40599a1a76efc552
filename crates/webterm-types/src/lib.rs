//! Shared domain and wire types for the webterm terminal relay.
//!
//! These types are serde-facing and carry no I/O: the relay core and the web
//! layer both depend on them without pulling in each other's stacks.

pub mod control;
pub mod credential;
pub mod session;
pub mod target;

pub use control::{ControlChannelMode, ControlMessage, ControlParseError};
pub use credential::Credential;
pub use session::RelaySummary;
pub use target::ConnectionTarget;
