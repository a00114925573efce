use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// Default packet engine host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default packet engine TCP port.
pub const DEFAULT_PORT: u16 = 8000;

/// A connected TCP stream to a packet engine server — implements Read + Write.
///
/// The same connection carries both directions of the frame protocol; clone
/// the stream with [`EngineStream::try_clone`] to read and write from
/// different threads.
pub struct EngineStream {
    inner: TcpStream,
}

impl EngineStream {
    /// Connect to a packet engine server (blocking).
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Connect {
            addr: addr.clone(),
            source: e,
        })?;
        debug!(%addr, "connected to packet engine");
        Ok(Self { inner: stream })
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self { inner: cloned })
    }

    /// Shut down both directions of the connection.
    ///
    /// This is the only way to unblock a thread sitting in a read on another
    /// clone of the stream. Shutting down an already-gone connection is not
    /// an error.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Address of the connected server.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }
}

impl Read for EngineStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for EngineStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for EngineStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineStream")
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}

/// Whether an I/O error means the connection is already gone.
///
/// A receive loop treats these as normal end-of-stream, the same as a read
/// returning zero bytes. Anything else is a real failure.
pub fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::NotConnected
    )
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    #[test]
    fn connect_and_echo() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut stream, _addr) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let mut stream = EngineStream::connect("127.0.0.1", port).unwrap();
        stream.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        server.join().unwrap();
    }

    #[test]
    fn connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = EngineStream::connect("127.0.0.1", port);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn shutdown_unblocks_reader() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (_stream, _addr) = listener.accept().unwrap();
            // Keep the server side open until the client has shut down.
            thread::sleep(Duration::from_millis(200));
        });

        let stream = EngineStream::connect("127.0.0.1", port).unwrap();
        let mut reader = stream.try_clone().unwrap();

        let read_thread = thread::spawn(move || {
            let mut buf = [0u8; 16];
            reader.read(&mut buf)
        });

        thread::sleep(Duration::from_millis(50));
        stream.shutdown().unwrap();

        let outcome = read_thread.join().unwrap();
        match outcome {
            Ok(0) => {}
            Ok(n) => panic!("unexpected read of {n} bytes"),
            Err(err) => assert!(is_disconnect(&err), "unexpected error: {err}"),
        }

        server.join().unwrap();
    }

    #[test]
    fn shutdown_twice_is_ok() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let _ = listener.accept();
        });

        let stream = EngineStream::connect("127.0.0.1", port).unwrap();
        stream.shutdown().unwrap();
        stream.shutdown().unwrap();

        server.join().unwrap();
    }

    #[test]
    fn disconnect_classification() {
        assert!(is_disconnect(&std::io::Error::from(
            ErrorKind::ConnectionReset
        )));
        assert!(is_disconnect(&std::io::Error::from(
            ErrorKind::ConnectionAborted
        )));
        assert!(is_disconnect(&std::io::Error::from(ErrorKind::NotConnected)));
        assert!(!is_disconnect(&std::io::Error::from(ErrorKind::WouldBlock)));
        assert!(!is_disconnect(&std::io::Error::from(
            ErrorKind::PermissionDenied
        )));
    }
}
