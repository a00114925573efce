use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};

use crate::error::{FrameError, Result};
use crate::header::{Frame, FrameHeader, HEADER_SIZE};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// The transport delivers bytes in arbitrary chunks; this reassembles them
/// into discrete (header, payload) frames. A decoded header stays pending
/// across reads until its full payload has arrived, so frame boundaries
/// never have to line up with read boundaries.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    pending: Option<FrameHeader>,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            pending: None,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.take_frame()? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Pull one complete frame out of the buffer, if enough bytes are in.
    fn take_frame(&mut self) -> Result<Option<Frame>> {
        let header = match self.pending.take() {
            Some(header) => header,
            None => {
                if self.buf.len() < HEADER_SIZE {
                    return Ok(None);
                }
                let header = FrameHeader::decode(&self.buf[..HEADER_SIZE])?;
                self.buf.advance(HEADER_SIZE);
                header
            }
        };

        let need = header.data_len as usize;
        if self.buf.len() < need {
            self.pending = Some(header);
            return Ok(None);
        }

        let payload = self.buf.split_to(need).freeze();
        Ok(Some(Frame { header, payload }))
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::writer::FrameWriter;

    fn frame_bytes(kind: char, payload: &[u8]) -> Vec<u8> {
        let header = FrameHeader::new(0, kind, 0, "N0CALL", "N1CALL", payload.len() as u32);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        buf.extend_from_slice(payload);
        buf.to_vec()
    }

    #[test]
    fn single_frame_single_read() {
        let wire = frame_bytes('D', b"hello");
        let mut reader = FrameReader::new(Cursor::new(wire));

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.header.kind, 'D');
        assert_eq!(frame.header.call_from, "N0CALL");
        assert_eq!(frame.payload.as_ref(), b"hello");

        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn empty_payload_frame() {
        let wire = frame_bytes('C', b"");
        let mut reader = FrameReader::new(Cursor::new(wire));

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.header.kind, 'C');
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn two_concatenated_frames_in_one_read() {
        let mut wire = frame_bytes('D', b"first");
        wire.extend(frame_bytes('d', b"second"));
        let mut reader = FrameReader::new(Cursor::new(wire));

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        assert_eq!((f1.header.kind, f1.payload.as_ref()), ('D', b"first".as_ref()));
        assert_eq!((f2.header.kind, f2.payload.as_ref()), ('d', b"second".as_ref()));
    }

    #[test]
    fn byte_by_byte_delivery() {
        let wire = frame_bytes('D', b"slow");
        let mut reader = FrameReader::new(ByteByByteReader {
            bytes: wire,
            pos: 0,
        });

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.header.kind, 'D');
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[test]
    fn split_mid_header_and_mid_payload() {
        let wire = frame_bytes('D', b"payload-bytes");
        // One cut inside the header, one inside the payload.
        let chunks = vec![
            wire[..10].to_vec(),
            wire[10..HEADER_SIZE + 4].to_vec(),
            wire[HEADER_SIZE + 4..].to_vec(),
        ];
        let mut reader = FrameReader::new(ChunkedReader { chunks, pos: 0 });

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.header.kind, 'D');
        assert_eq!(frame.payload.as_ref(), b"payload-bytes");
    }

    #[test]
    fn arbitrary_splits_yield_identical_frames() {
        let wire = frame_bytes('D', b"determinism");
        let whole = {
            let mut reader = FrameReader::new(Cursor::new(wire.clone()));
            reader.read_frame().unwrap()
        };

        for split in 1..wire.len() {
            let chunks = vec![wire[..split].to_vec(), wire[split..].to_vec()];
            let mut reader = FrameReader::new(ChunkedReader { chunks, pos: 0 });
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.header, whole.header, "split at {split}");
            assert_eq!(frame.payload, whole.payload, "split at {split}");
        }
    }

    #[test]
    fn eof_mid_frame() {
        let mut wire = frame_bytes('D', b"truncated");
        wire.truncate(HEADER_SIZE + 3);
        let mut reader = FrameReader::new(Cursor::new(wire));

        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn eof_mid_header() {
        let wire = frame_bytes('D', b"x");
        let mut reader = FrameReader::new(Cursor::new(wire[..20].to_vec()));

        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let wire = frame_bytes('D', b"ok");
        let mut reader = FrameReader::new(InterruptedThenData {
            interrupted: false,
            bytes: wire,
            pos: 0,
        });

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    #[test]
    fn io_error_propagates() {
        struct FailingReader;
        impl Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(ErrorKind::PermissionDenied))
            }
        }

        let mut reader = FrameReader::new(FailingReader);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::PermissionDenied));
    }

    #[test]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let header = FrameHeader::new(1, 'D', 0xF0, "N0CALL", "N1CALL", 4);
        writer.send(&header, b"ping").unwrap();

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.header, header);
        assert_eq!(frame.payload.as_ref(), b"ping");
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct ChunkedReader {
        chunks: Vec<Vec<u8>>,
        pos: usize,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.chunks.len() {
                return Ok(0);
            }
            let chunk = &self.chunks[self.pos];
            self.pos += 1;
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
