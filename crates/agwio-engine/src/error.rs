/// Errors that can occur in engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] agwio_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] agwio_frame::FrameError),

    /// The operation requires an open server connection.
    #[error("not connected to a packet engine server")]
    NotConnected,

    /// A server connection is already open.
    #[error("already connected to a packet engine server")]
    AlreadyConnected,

    /// The source callsign was never registered with the server.
    #[error("callsign {0} is not registered")]
    CallsignNotRegistered(String),

    /// A session already exists for this port and callsign pair.
    #[error("connection already exists on port {port} between {call_a} and {call_b}")]
    DuplicateConnection {
        port: u8,
        call_a: String,
        call_b: String,
    },

    /// The wire format cannot carry both an explicit PID and a via path.
    #[error("a connection cannot specify both a pid and a via path")]
    PidWithVia,

    /// No session factory was configured for connected-mode sessions.
    #[error("no connection factory configured")]
    NoConnectionFactory,
}

pub type Result<T> = std::result::Result<T, EngineError>;
