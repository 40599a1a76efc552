//! Core of the web terminal relay: opens an interactive shell session on a
//! managed host over SSH and bridges it to a browser-facing duplex stream.
//!
//! The crate is transport-agnostic on the client side. [`relay::ClientSource`]
//! and [`relay::ClientSink`] are the seam; the web layer adapts its WebSocket
//! halves onto them and everything below this line only sees frames.

pub mod error;
pub mod handler;
pub mod keys;
pub mod registry;
pub mod relay;
pub mod resolver;
pub mod session;
pub mod utf8;

mod auth;

#[cfg(test)]
mod testutil;

pub use error::{RelayError, RelayResult};
pub use registry::RelayRegistry;
pub use relay::{
    ClientFrame, ClientSink, ClientSource, LifecycleHook, Relay, RelayOptions, RelayState,
};
pub use resolver::CredentialResolver;
pub use session::{RemoteSession, SessionOptions};
pub use utf8::Utf8Stitcher;
