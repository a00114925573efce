//! TCP transport to an AGWPE-style packet engine server.
//!
//! A packet engine exposes its frame protocol on a plain TCP port
//! (127.0.0.1:8000 by default). This is the lowest layer of agwio.
//! Everything else builds on top of the [`EngineStream`] type provided
//! here.

pub mod error;
pub mod tcp;

pub use error::{Result, TransportError};
pub use tcp::{is_disconnect, EngineStream, DEFAULT_HOST, DEFAULT_PORT};
