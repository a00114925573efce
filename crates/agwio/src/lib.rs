//! Client for AGWPE-style packet engine servers.
//!
//! A packet engine bridges TCP/IP clients to AX.25 radio links. This crate
//! is the "just works" layer: [`Application`] wires an engine instance, a
//! connection registry, and a chain of receive handlers together, so most
//! programs never touch the frame protocol directly.
//!
//! Lower layers are re-exported for programs that need them:
//! [`PacketEngine`] for the raw operation set, `agwio-frame` types for the
//! wire codecs, and `agwio-transport` for the TCP stream itself.
//!
//! Protocol reference:
//! <https://www.on7lds.net/42/sites/default/files/AGWPEAPI.HTM>

pub mod app;
pub mod chain;
pub mod debug;
pub mod monitor;

pub use agwio_engine::{
    AcceptPolicy, Connection, ConnectionFactory, ConnectionHandler, ConnectionKey,
    ConnectionState, Connections, EngineError, EngineObserver, NullReceiveHandler, PacketEngine,
    ReceiveHandler, ReadySignal, Result, Version, DEFAULT_PID,
};
pub use agwio_frame::{
    Frame, FrameError, FrameHeader, FrameReader, FrameWriter, HeardCall, PortCaps,
};
pub use agwio_transport::{EngineStream, TransportError, DEFAULT_HOST, DEFAULT_PORT};

pub use app::Application;
pub use chain::MultiReceiveHandler;
pub use debug::DebugReceiveHandler;
pub use monitor::{Monitor, MonitorReceiveHandler};
