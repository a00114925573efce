//! AX.25 connected-session management.
//!
//! [`Connections`] tracks logical sessions keyed by port and callsign pair,
//! demultiplexing inbound connection, data, and disconnect frames to
//! per-session [`ConnectionHandler`] values. Its receive handler must be
//! part of the engine's handler chain for sessions to be managed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::engine::PacketEngine;
use crate::error::{EngineError, Result};
use crate::handler::ReceiveHandler;

/// Marker the server includes in a disconnect message when the link died of
/// retry exhaustion rather than an orderly disconnect.
const TIMEOUT_MARKER: &str = "RETRYOUT";

/// The current state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to connect.
    Connecting,
    /// Successfully connected.
    Connected,
    /// Attempting to disconnect.
    Disconnecting,
    /// No longer connected.
    Disconnected,
    /// The connection timed out.
    TimedOut,
}

/// Registry key: one session per (port, callsign pair).
///
/// The pair is stored sorted, so a session is found under the same key no
/// matter which side a frame names as `call_from`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    port: u8,
    calls: (String, String),
}

impl ConnectionKey {
    pub fn new(port: u8, call_a: &str, call_b: &str) -> Self {
        let (first, second) = if call_a <= call_b {
            (call_a, call_b)
        } else {
            (call_b, call_a)
        };
        Self {
            port,
            calls: (first.to_string(), second.to_string()),
        }
    }
}

/// Per-session callbacks.
///
/// One value is created per session by the registry's factory. All methods
/// run on the engine's receive thread.
pub trait ConnectionHandler: Send + Sync {
    /// The session reached [`ConnectionState::Connected`].
    fn connected(&self, _conn: &Connection) {}

    /// The session ended. It has already been removed from the registry by
    /// the time this runs.
    fn disconnected(&self, _conn: &Connection) {}

    /// Data arrived on the open session.
    fn data_received(&self, _conn: &Connection, _pid: u8, _data: &[u8]) {}
}

/// Creates the [`ConnectionHandler`] for each new session.
pub type ConnectionFactory = Arc<dyn Fn() -> Box<dyn ConnectionHandler> + Send + Sync>;

/// Decides whether an incoming connection is accepted. Rejected connections
/// are dropped without a reply, so the remote eventually times out.
pub type AcceptPolicy = Arc<dyn Fn(u8, &str, &str) -> bool + Send + Sync>;

/// An AX.25 connected session between two stations.
///
/// Created either by [`Connections::open`] or by acceptance of an incoming
/// connection. Sending data or closing is legal only while the session
/// object exists.
pub struct Connection {
    port: u8,
    call_from: String,
    call_to: String,
    incoming: bool,
    key: ConnectionKey,
    state: Mutex<ConnectionState>,
    engine: PacketEngine,
    handler: Box<dyn ConnectionHandler>,
}

impl Connection {
    /// Port on which the connection was established.
    pub fn port(&self) -> u8 {
        self.port
    }

    /// Callsign of the station that initiated the connection.
    pub fn call_from(&self) -> &str {
        &self.call_from
    }

    /// Callsign of the station receiving the connection.
    pub fn call_to(&self) -> &str {
        &self.call_to
    }

    /// Whether the connection was initiated by the remote station.
    pub fn incoming(&self) -> bool {
        self.incoming
    }

    /// Current state of the connection.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("poisoned lock")
    }

    /// Registry key for this session.
    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Send data on the open session.
    pub fn send_data(&self, data: &[u8]) -> Result<()> {
        if self.incoming {
            self.engine
                .send_data(self.port, &self.call_to, &self.call_from, data, None)
        } else {
            self.engine
                .send_data(self.port, &self.call_from, &self.call_to, data, None)
        }
    }

    /// Request an orderly close.
    ///
    /// The session reaches its terminal state only when the server's
    /// disconnect confirmation arrives through the normal inbound path; this
    /// does not finalize state eagerly.
    pub fn close(&self) -> Result<()> {
        self.set_state(ConnectionState::Disconnecting);
        if self.incoming {
            self.engine
                .disconnect(self.port, &self.call_to, &self.call_from)
        } else {
            self.engine
                .disconnect(self.port, &self.call_from, &self.call_to)
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("poisoned lock") = state;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("port", &self.port)
            .field("call_from", &self.call_from)
            .field("call_to", &self.call_to)
            .field("incoming", &self.incoming)
            .field("state", &self.state())
            .finish()
    }
}

struct ConnectionsInner {
    engine: PacketEngine,
    map: Mutex<HashMap<ConnectionKey, Arc<Connection>>>,
    factory: ConnectionFactory,
    accept: AcceptPolicy,
}

/// Focal point for connected-mode sessions.
///
/// Create one per engine, add its [`receive_handler`](Connections::receive_handler)
/// to the engine's handler chain, and open sessions with
/// [`open`](Connections::open).
#[derive(Clone)]
pub struct Connections {
    inner: Arc<ConnectionsInner>,
}

impl Connections {
    /// Create a session registry.
    ///
    /// `factory` builds the per-session handler; `accept` gates incoming
    /// connections (return `false` to drop them silently).
    pub fn new(engine: PacketEngine, factory: ConnectionFactory, accept: AcceptPolicy) -> Self {
        Self {
            inner: Arc::new(ConnectionsInner {
                engine,
                map: Mutex::new(HashMap::new()),
                factory,
                accept,
            }),
        }
    }

    /// The receive handler that routes connection frames to sessions.
    pub fn receive_handler(&self) -> Arc<dyn ReceiveHandler> {
        Arc::new(ConnectionReceiveHandler {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Open a new connected-mode session, optionally via intermediary
    /// digipeaters.
    ///
    /// Fails with [`EngineError::DuplicateConnection`] if a session already
    /// exists for the same port and callsign pair, in either direction.
    pub fn open(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        via: Option<&[&str]>,
    ) -> Result<Arc<Connection>> {
        let key = ConnectionKey::new(port, call_from, call_to);
        let conn = Arc::new(Connection {
            port,
            call_from: call_from.to_string(),
            call_to: call_to.to_string(),
            incoming: false,
            key: key.clone(),
            state: Mutex::new(ConnectionState::Connecting),
            engine: self.inner.engine.clone(),
            handler: (self.inner.factory)(),
        });

        {
            let mut map = self.inner.map.lock().expect("poisoned lock");
            if map.contains_key(&key) {
                return Err(EngineError::DuplicateConnection {
                    port,
                    call_a: call_from.to_string(),
                    call_b: call_to.to_string(),
                });
            }
            map.insert(key.clone(), Arc::clone(&conn));
        }

        if let Err(err) = self.inner.engine.connect(port, call_from, call_to, via, None) {
            self.inner.map.lock().expect("poisoned lock").remove(&key);
            return Err(err);
        }
        Ok(conn)
    }

    /// Look up the session for a port and callsign pair, in either
    /// direction.
    pub fn find(&self, port: u8, call_a: &str, call_b: &str) -> Option<Arc<Connection>> {
        let key = ConnectionKey::new(port, call_a, call_b);
        self.inner.map.lock().expect("poisoned lock").get(&key).cloned()
    }

    /// Number of currently registered sessions.
    pub fn len(&self) -> usize {
        self.inner.map.lock().expect("poisoned lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receive handler that drives session state from inbound frames.
struct ConnectionReceiveHandler {
    inner: Arc<ConnectionsInner>,
}

impl ConnectionReceiveHandler {
    fn find(&self, port: u8, call_a: &str, call_b: &str) -> Option<Arc<Connection>> {
        let key = ConnectionKey::new(port, call_a, call_b);
        self.inner.map.lock().expect("poisoned lock").get(&key).cloned()
    }
}

impl ReceiveHandler for ConnectionReceiveHandler {
    fn connection_received(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        incoming: bool,
        _message: &str,
    ) {
        if incoming {
            let key = ConnectionKey::new(port, call_from, call_to);
            if self
                .inner
                .map
                .lock()
                .expect("poisoned lock")
                .contains_key(&key)
            {
                // Already handled; nothing more to do for this session.
                return;
            }
            if !(self.inner.accept)(port, call_from, call_to) {
                // No session and no reply; the remote eventually times out.
                debug!(port, call_from, call_to, "incoming connection refused");
                return;
            }
            let conn = Arc::new(Connection {
                port,
                call_from: call_from.to_string(),
                call_to: call_to.to_string(),
                incoming: true,
                key: key.clone(),
                state: Mutex::new(ConnectionState::Connected),
                engine: self.inner.engine.clone(),
                handler: (self.inner.factory)(),
            });
            {
                let mut map = self.inner.map.lock().expect("poisoned lock");
                if map.contains_key(&key) {
                    return;
                }
                map.insert(key, Arc::clone(&conn));
            }
            conn.handler.connected(&conn);
        } else {
            // Our own earlier open() completing.
            let Some(conn) = self.find(port, call_from, call_to) else {
                return;
            };
            conn.set_state(ConnectionState::Connected);
            conn.handler.connected(&conn);
        }
    }

    fn connected_data(&self, port: u8, call_from: &str, call_to: &str, pid: u8, data: &[u8]) {
        // Unknown keys are stray or late-arriving frames; drop them.
        if let Some(conn) = self.find(port, call_from, call_to) {
            conn.handler.data_received(&conn, pid, data);
        }
    }

    fn disconnected(&self, port: u8, call_from: &str, call_to: &str, message: &str) {
        let key = ConnectionKey::new(port, call_from, call_to);
        let removed = self.inner.map.lock().expect("poisoned lock").remove(&key);
        let Some(conn) = removed else {
            return;
        };
        // Removal happens before the callback so the callback never observes
        // a stale live registration.
        if message.contains(TIMEOUT_MARKER) {
            conn.set_state(ConnectionState::TimedOut);
        } else {
            conn.set_state(ConnectionState::Disconnected);
        }
        conn.handler.disconnected(&conn);
    }
}
