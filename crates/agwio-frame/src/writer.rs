use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::error::{FrameError, Result};
use crate::header::{Frame, FrameHeader};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Writes complete frames to any `Write` stream.
///
/// A short write is not an error, just a signal to keep writing the
/// remainder; the loop continues until the transport has accepted every
/// byte of the encoded frame.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and send one frame (blocking).
    ///
    /// The header's `data_len` must match the payload length.
    pub fn send(&mut self, header: &FrameHeader, payload: &[u8]) -> Result<()> {
        debug_assert_eq!(header.data_len as usize, payload.len());

        self.buf.clear();
        header.encode(&mut self.buf);
        self.buf.extend_from_slice(payload);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Send an already-assembled frame.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(&frame.header, frame.payload.as_ref())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::header::HEADER_SIZE;
    use crate::reader::FrameReader;

    #[test]
    fn written_bytes_decode() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let header = FrameHeader::new(1, 'M', 0xF0, "N0CALL", "CQ", 5);
        writer.send(&header, b"hello").unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire.len(), HEADER_SIZE + 5);

        let mut reader = FrameReader::new(Cursor::new(wire));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.header, header);
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[test]
    fn zero_length_payload() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let header = FrameHeader::new(0, 'R', 0, "", "", 0);
        writer.send(&header, b"").unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire.len(), HEADER_SIZE);
    }

    #[test]
    fn short_writes_are_retried() {
        let sink = DribbleWriter {
            data: Vec::new(),
            max_per_write: 3,
        };
        let mut writer = FrameWriter::new(sink);
        let header = FrameHeader::new(0, 'D', 0xF0, "N0CALL", "N1CALL", 9);
        writer.send(&header, b"dribbled!").unwrap();

        let wire = writer.into_inner().data;
        let mut reader = FrameReader::new(Cursor::new(wire));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"dribbled!");
    }

    #[test]
    fn interrupted_and_would_block_retried() {
        let sink = FlakyWriter {
            data: Vec::new(),
            hiccups: 2,
        };
        let mut writer = FrameWriter::new(sink);
        let header = FrameHeader::new(0, 'D', 0xF0, "A", "B", 2);
        writer.send(&header, b"ok").unwrap();

        assert_eq!(writer.get_ref().data.len(), HEADER_SIZE + 2);
    }

    #[test]
    fn zero_write_is_connection_closed() {
        struct ZeroWriter;
        impl Write for ZeroWriter {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut writer = FrameWriter::new(ZeroWriter);
        let header = FrameHeader::new(0, 'D', 0xF0, "A", "B", 1);
        let err = writer.send(&header, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn io_error_propagates() {
        struct BrokenWriter;
        impl Write for BrokenWriter {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut writer = FrameWriter::new(BrokenWriter);
        let header = FrameHeader::new(0, 'D', 0xF0, "A", "B", 1);
        let err = writer.send(&header, b"x").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    struct DribbleWriter {
        data: Vec<u8>,
        max_per_write: usize,
    }

    impl Write for DribbleWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.max_per_write);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct FlakyWriter {
        data: Vec<u8>,
        hiccups: u8,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.hiccups == 2 {
                self.hiccups -= 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.hiccups == 1 {
                self.hiccups -= 1;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
