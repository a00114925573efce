//! AGWPE wire layer.
//!
//! Every frame in both directions starts with the same fixed 36-byte header:
//! - port (1 byte) plus 3 reserved bytes
//! - kind (1 ASCII byte) plus 1 reserved byte
//! - pid (1 byte) plus 1 reserved byte
//! - call_from and call_to (10 bytes each, NUL padded)
//! - payload length (4 bytes LE) plus 4 reserved bytes
//!
//! The payload follows immediately and is exactly as long as the header
//! declares (zero is valid). No magic number, no resynchronization; the
//! stream is only ever parsed from a clean connection start.

pub mod error;
pub mod header;
pub mod kind;
pub mod reader;
pub mod records;
pub mod writer;

pub use error::{FrameError, Result};
pub use header::{put_callsign, Frame, FrameHeader, CALL_SIZE, HEADER_SIZE};
pub use kind::{kind_info, KindInfo, LenRule};
pub use reader::FrameReader;
pub use records::{HeardCall, PortCaps, PORT_CAPS_SIZE};
pub use writer::FrameWriter;
