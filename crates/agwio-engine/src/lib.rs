//! Packet engine client.
//!
//! [`PacketEngine`] talks the low-level frame protocol to an AGWPE-style
//! server: one background thread reassembles and dispatches inbound frames
//! to a [`ReceiveHandler`], while public operations encode and send frames
//! from the caller's thread. Bring-up (version, port list, per-port
//! capabilities) runs automatically; `connect_to_server` does not return
//! until the engine is ready for use.
//!
//! [`Connections`] layers AX.25 session management on top: it demultiplexes
//! connection, data, and disconnect frames to per-session
//! [`ConnectionHandler`] values keyed by port and callsign pair.

mod bootstrap;
pub mod connect;
mod dispatch;
pub mod engine;
pub mod error;
pub mod event;
pub mod handler;

pub use connect::{
    AcceptPolicy, Connection, ConnectionFactory, ConnectionHandler, ConnectionKey,
    ConnectionState, Connections,
};
pub use engine::{PacketEngine, Version, DEFAULT_PID};
pub use error::{EngineError, Result};
pub use event::{EngineObserver, ReadySignal};
pub use handler::{NullReceiveHandler, ReceiveHandler};
