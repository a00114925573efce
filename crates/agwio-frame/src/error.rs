/// Errors that can occur in the frame and record codecs.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame header buffer was not exactly 36 bytes.
    #[error("invalid header length: {len}")]
    InvalidHeaderLength { len: usize },

    /// A port capabilities record was not exactly 12 bytes.
    #[error("invalid capabilities length: {len}")]
    InvalidCapsLength { len: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection ended cleanly (EOF from the peer).
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
