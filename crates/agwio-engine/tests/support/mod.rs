#![allow(dead_code)] // each test binary uses a different slice of this helper

//! Scripted in-process packet engine server for integration tests.
//!
//! Accepts one client, answers the bring-up exchange automatically, echoes
//! registration requests with a success reply, and (optionally) confirms
//! connect and disconnect requests the way a real server would. Every frame
//! the client sends is recorded for assertions, and arbitrary frames can be
//! injected toward the client at any time.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use agwio_frame::{Frame, FrameHeader, FrameReader, FrameWriter};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct MockServer {
    addr: SocketAddr,
    writer: Arc<Mutex<Option<FrameWriter<TcpStream>>>>,
    received: Arc<Mutex<Vec<Frame>>>,
}

impl MockServer {
    /// Spawn a server advertising the given port descriptions, confirming
    /// connect and disconnect requests automatically.
    pub fn spawn(ports: &[&str]) -> Self {
        Self::spawn_with(ports, true)
    }

    pub fn spawn_with(ports: &[&str], auto_confirm: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let writer: Arc<Mutex<Option<FrameWriter<TcpStream>>>> = Arc::new(Mutex::new(None));
        let received: Arc<Mutex<Vec<Frame>>> = Arc::new(Mutex::new(Vec::new()));

        let ports: Vec<String> = ports.iter().map(|p| p.to_string()).collect();
        let writer_slot = Arc::clone(&writer);
        let received_log = Arc::clone(&received);

        thread::spawn(move || {
            let Ok((stream, _addr)) = listener.accept() else {
                return;
            };
            let reader_stream = stream.try_clone().unwrap();
            *writer_slot.lock().unwrap() = Some(FrameWriter::new(stream));
            let mut reader = FrameReader::new(reader_stream);

            loop {
                let frame = match reader.read_frame() {
                    Ok(frame) => frame,
                    Err(_) => break,
                };
                received_log.lock().unwrap().push(frame.clone());

                let header = &frame.header;
                let reply = match header.kind {
                    'R' => {
                        let mut payload = Vec::new();
                        payload.extend_from_slice(&2005u16.to_le_bytes());
                        payload.extend_from_slice(&[0, 0]);
                        payload.extend_from_slice(&127u16.to_le_bytes());
                        payload.extend_from_slice(&[0, 0]);
                        Some((FrameHeader::new(0, 'R', 0, "", "", 8), payload))
                    }
                    'G' => {
                        let mut text = format!("{};", ports.len());
                        for port in &ports {
                            text.push_str(port);
                            text.push(';');
                        }
                        let mut payload = text.into_bytes();
                        payload.push(0);
                        let len = payload.len() as u32;
                        Some((FrameHeader::new(0, 'G', 0, "", "", len), payload))
                    }
                    'g' => {
                        // Distinguish ports by baud rate.
                        let mut payload = vec![0u8; 12];
                        payload[0] = header.port + 1;
                        Some((FrameHeader::new(header.port, 'g', 0, "", "", 12), payload))
                    }
                    'X' => Some((
                        FrameHeader::new(0, 'X', 0, &header.call_from, "", 1),
                        vec![1],
                    )),
                    'C' if auto_confirm => {
                        let message = format!("*** CONNECTED With {}", header.call_to);
                        let payload = message.into_bytes();
                        let len = payload.len() as u32;
                        Some((
                            FrameHeader::new(
                                header.port,
                                'C',
                                0,
                                &header.call_from,
                                &header.call_to,
                                len,
                            ),
                            payload,
                        ))
                    }
                    'd' if auto_confirm => {
                        let message = format!("*** DISCONNECTED From {}", header.call_to);
                        let payload = message.into_bytes();
                        let len = payload.len() as u32;
                        Some((
                            FrameHeader::new(
                                header.port,
                                'd',
                                0,
                                &header.call_from,
                                &header.call_to,
                                len,
                            ),
                            payload,
                        ))
                    }
                    _ => None,
                };

                if let Some((header, payload)) = reply {
                    let mut writer = writer_slot.lock().unwrap();
                    if let Some(writer) = writer.as_mut() {
                        if writer.send(&header, &payload).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            addr,
            writer,
            received,
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Send a frame to the connected client.
    pub fn inject(&self, header: FrameHeader, payload: &[u8]) {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            {
                let mut writer = self.writer.lock().unwrap();
                if let Some(writer) = writer.as_mut() {
                    writer.send(&header, payload).unwrap();
                    return;
                }
            }
            assert!(Instant::now() < deadline, "no client connected to inject into");
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Close the server side of the connection.
    pub fn close(&self) {
        if let Some(writer) = self.writer.lock().unwrap().take() {
            let _ = writer.get_ref().shutdown(std::net::Shutdown::Both);
        }
    }

    /// Snapshot of every frame received from the client so far.
    pub fn received(&self) -> Vec<Frame> {
        self.received.lock().unwrap().clone()
    }

    /// Kinds of every frame received so far, in arrival order.
    pub fn received_kinds(&self) -> Vec<char> {
        self.received().iter().map(|f| f.header.kind).collect()
    }

    /// Block until the client has sent a frame of this kind, and return it.
    pub fn wait_for_kind(&self, kind: char) -> Frame {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            if let Some(frame) = self.received().into_iter().find(|f| f.header.kind == kind) {
                return frame;
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for a '{kind}' frame"
            );
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Poll until a condition holds, with a hard timeout.
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(POLL_INTERVAL);
    }
}
