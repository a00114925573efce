use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Wire size of the frame header. Every frame starts with exactly this many
/// bytes, in both directions.
pub const HEADER_SIZE: usize = 36;

/// Wire size of an encoded callsign field.
pub const CALL_SIZE: usize = 10;

/// The header carried by every AGWPE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Radio port the frame refers to.
    pub port: u8,
    /// Frame kind, a single ASCII character selecting the frame semantics.
    pub kind: char,
    /// Protocol id for data frames; zero elsewhere.
    pub pid: u8,
    /// Originating callsign.
    pub call_from: String,
    /// Destination callsign.
    pub call_to: String,
    /// Byte length of the payload that follows the header.
    pub data_len: u32,
}

impl FrameHeader {
    pub fn new(
        port: u8,
        kind: char,
        pid: u8,
        call_from: &str,
        call_to: &str,
        data_len: u32,
    ) -> Self {
        Self {
            port,
            kind,
            pid,
            call_from: call_from.to_string(),
            call_to: call_to.to_string(),
            data_len,
        }
    }

    /// Encode the header into exactly [`HEADER_SIZE`] bytes.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u8(self.port);
        dst.put_bytes(0, 3);
        dst.put_u8(self.kind as u8);
        dst.put_u8(0);
        dst.put_u8(self.pid);
        dst.put_u8(0);
        put_callsign(dst, &self.call_from);
        put_callsign(dst, &self.call_to);
        dst.put_u32_le(self.data_len);
        dst.put_bytes(0, 4);
    }

    /// Decode a header from exactly [`HEADER_SIZE`] bytes.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() != HEADER_SIZE {
            return Err(FrameError::InvalidHeaderLength { len: src.len() });
        }
        let mut buf = src;
        let port = buf.get_u8();
        buf.advance(3);
        let kind = buf.get_u8() as char;
        buf.advance(1);
        let pid = buf.get_u8();
        buf.advance(1);
        let call_from = take_callsign(&mut buf);
        let call_to = take_callsign(&mut buf);
        let data_len = buf.get_u32_le();
        Ok(Self {
            port,
            kind,
            pid,
            call_from,
            call_to,
            data_len,
        })
    }
}

/// Append a callsign as a fixed 10-byte NUL-padded field.
///
/// Longer input is truncated at the field boundary, the way the wire format
/// itself would.
pub fn put_callsign(dst: &mut BytesMut, call: &str) {
    let bytes = call.as_bytes();
    let used = bytes.len().min(CALL_SIZE);
    dst.put_slice(&bytes[..used]);
    dst.put_bytes(0, CALL_SIZE - used);
}

fn take_callsign(buf: &mut &[u8]) -> String {
    let field = &buf[..CALL_SIZE];
    let call = String::from_utf8_lossy(field)
        .trim_end_matches('\0')
        .to_string();
    buf.advance(CALL_SIZE);
    call
}

/// A complete frame: header plus its payload.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: FrameHeader,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    pub fn new(header: FrameHeader, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }
}
