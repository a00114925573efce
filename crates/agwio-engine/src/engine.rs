use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread;

use bytes::{BufMut, BytesMut};
use tracing::{debug, error, info};

use agwio_frame::{
    put_callsign, FrameError, FrameHeader, FrameReader, FrameWriter, PortCaps, CALL_SIZE,
};
use agwio_transport::{is_disconnect, EngineStream, TransportError};

use crate::bootstrap::{BootstrapHandler, BringupLink};
use crate::dispatch;
use crate::error::{EngineError, Result};
use crate::event::{EngineObserver, ReadySignal};
use crate::handler::{NullReceiveHandler, ReceiveHandler};

/// Default PID for connected-mode and unproto traffic.
pub const DEFAULT_PID: u8 = 0xF0;

/// Cached server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

/// The packet engine client.
///
/// A cheaply cloneable handle; all clones talk to the same server
/// connection. Set a receive handler, then call
/// [`connect_to_server`](PacketEngine::connect_to_server); the call returns
/// once bring-up has completed and the version, port list, and per-port
/// capabilities are cached.
#[derive(Clone)]
pub struct PacketEngine {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct EngineState {
    ready: bool,
    registered_callsigns: Vec<String>,
    monitor_enabled: bool,
    raw_enabled: bool,
    version: Option<Version>,
    port_info: Option<Vec<String>>,
    port_caps: Vec<PortCaps>,
}

pub(crate) struct Shared {
    writer: Mutex<Option<FrameWriter<EngineStream>>>,
    /// Second handle on the connected stream, kept for shutdown.
    stream: Mutex<Option<EngineStream>>,
    state: Mutex<EngineState>,
    /// Handler inbound frames are dispatched to right now: the bootstrap
    /// sequence during bring-up, the client handler afterwards.
    active: RwLock<Arc<dyn ReceiveHandler>>,
    client_handler: RwLock<Arc<dyn ReceiveHandler>>,
    ready: ReadySignal,
    observers: Mutex<Vec<Arc<dyn EngineObserver>>>,
}

impl PacketEngine {
    pub fn new() -> Self {
        Self::with_handler(Arc::new(NullReceiveHandler))
    }

    /// Create an engine with the given client receive handler.
    pub fn with_handler(handler: Arc<dyn ReceiveHandler>) -> Self {
        Self {
            shared: Arc::new(Shared {
                writer: Mutex::new(None),
                stream: Mutex::new(None),
                state: Mutex::new(EngineState::default()),
                active: RwLock::new(handler.clone()),
                client_handler: RwLock::new(handler),
                ready: ReadySignal::new(),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Replace the client receive handler.
    ///
    /// If the old client handler is currently active, the new one takes its
    /// place immediately; a swap during bring-up only takes effect once the
    /// engine is ready.
    pub fn set_receive_handler(&self, handler: Arc<dyn ReceiveHandler>) {
        let mut client = self
            .shared
            .client_handler
            .write()
            .expect("poisoned lock");
        let was_active = {
            let active = self.shared.active.read().expect("poisoned lock");
            Arc::ptr_eq(&*active, &*client)
        };
        *client = handler.clone();
        if was_active {
            *self.shared.active.write().expect("poisoned lock") = handler;
        }
    }

    /// The current client receive handler.
    pub fn receive_handler(&self) -> Arc<dyn ReceiveHandler> {
        self.shared
            .client_handler
            .read()
            .expect("poisoned lock")
            .clone()
    }

    /// Register a lifecycle observer. Observers are invoked in registration
    /// order.
    pub fn add_observer(&self, observer: Arc<dyn EngineObserver>) {
        self.shared
            .observers
            .lock()
            .expect("poisoned lock")
            .push(observer);
    }

    /// Connect to the packet engine server and run bring-up.
    ///
    /// Blocks until the version, the port list, and every port's
    /// capabilities have been retrieved and cached. No timeout is enforced
    /// here; a caller wanting bounded start-up must close the engine from
    /// another thread or wrap this call.
    pub fn connect_to_server(&self, host: &str, port: u16) -> Result<()> {
        if self.connected_to_server() {
            return Err(EngineError::AlreadyConnected);
        }

        let stream = EngineStream::connect(host, port)?;
        let reader_stream = stream.try_clone()?;
        let writer = FrameWriter::new(stream.try_clone()?);

        self.shared.ready.reset();
        *self.shared.writer.lock().expect("poisoned lock") = Some(writer);
        *self.shared.stream.lock().expect("poisoned lock") = Some(stream);

        let shared_dyn: Arc<dyn BringupLink> = self.shared.clone();
        let link: Weak<dyn BringupLink> = Arc::downgrade(&shared_dyn);
        let bootstrap = Arc::new(BootstrapHandler::new(link));
        *self.shared.active.write().expect("poisoned lock") = bootstrap.clone();

        let shared = Arc::clone(&self.shared);
        let _receiver = thread::Builder::new()
            .name("agwio-receive".to_string())
            .spawn(move || shared.receive_loop(reader_stream))
            .map_err(TransportError::Io)?;

        self.shared.notify_observers(|o| o.server_connected());
        bootstrap.start();
        self.shared.ready.wait();
        // The latch is also released when the connection dies mid-bring-up.
        if !self.is_ready() {
            return Err(EngineError::NotConnected);
        }
        Ok(())
    }

    /// Disconnect from the packet engine server.
    ///
    /// Shuts the socket down, which terminates the receive thread on its
    /// next read. Do not call other operations afterwards, except to
    /// reconnect.
    pub fn disconnect_from_server(&self) -> Result<()> {
        let stream = self
            .shared
            .stream
            .lock()
            .expect("poisoned lock")
            .take()
            .ok_or(EngineError::NotConnected)?;
        self.shared.state.lock().expect("poisoned lock").ready = false;
        *self.shared.writer.lock().expect("poisoned lock") = None;
        stream.shutdown()?;
        // Closing the transport is the documented way to abort a bring-up
        // that will never complete; release any waiter.
        self.shared.ready.notify();
        self.shared.notify_observers(|o| o.server_disconnected());
        Ok(())
    }

    /// Whether a server connection is currently open.
    pub fn connected_to_server(&self) -> bool {
        self.shared.stream.lock().expect("poisoned lock").is_some()
    }

    /// Whether bring-up has completed on the current connection.
    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().expect("poisoned lock").ready
    }

    //
    // Port independent operations
    //

    /// Register a callsign for use with the server. Must be called before
    /// the callsign is used to initiate a connection. Registration completes
    /// when the server confirms via the
    /// [`callsign_registered`](ReceiveHandler::callsign_registered)
    /// callback. Frame kind: 'X'.
    pub fn register_callsign(&self, callsign: &str) -> Result<()> {
        if self.is_callsign_registered(callsign) {
            return Ok(());
        }
        self.shared
            .send_frame(&FrameHeader::new(0, 'X', 0, callsign, "", 0), &[])
        // Local registration happens when the server confirms via 'X'.
    }

    /// Unregister a callsign. Unregistration is complete when this returns;
    /// the server sends no confirmation. Frame kind: 'x'.
    pub fn unregister_callsign(&self, callsign: &str) -> Result<()> {
        if !self.is_callsign_registered(callsign) {
            return Ok(());
        }
        self.shared
            .send_frame(&FrameHeader::new(0, 'x', 0, callsign, "", 0), &[])?;
        let mut state = self.shared.state.lock().expect("poisoned lock");
        state.registered_callsigns.retain(|c| c != callsign);
        Ok(())
    }

    /// Whether the callsign has completed registration with the server.
    pub fn is_callsign_registered(&self, callsign: &str) -> bool {
        self.shared
            .state
            .lock()
            .expect("poisoned lock")
            .registered_callsigns
            .iter()
            .any(|c| c == callsign)
    }

    /// Request version information. The reply arrives via
    /// [`version_info`](ReceiveHandler::version_info) and is cached.
    /// Frame kind: 'R'.
    pub fn ask_version(&self) -> Result<()> {
        self.shared
            .send_frame(&FrameHeader::new(0, 'R', 0, "", "", 0), &[])
    }

    /// The cached server version, populated during bring-up.
    pub fn version_info(&self) -> Option<Version> {
        self.shared.state.lock().expect("poisoned lock").version
    }

    /// Request information on available ports. The reply arrives via
    /// [`port_info`](ReceiveHandler::port_info) and is cached.
    /// Frame kind: 'G'.
    pub fn ask_port_info(&self) -> Result<()> {
        self.shared
            .send_frame(&FrameHeader::new(0, 'G', 0, "", "", 0), &[])
    }

    /// The cached port list, populated during bring-up.
    pub fn cached_port_info(&self) -> Option<Vec<String>> {
        self.shared
            .state
            .lock()
            .expect("poisoned lock")
            .port_info
            .clone()
    }

    /// Enable or disable monitoring. A no-op if the state would not change.
    /// Frame kind: 'm'.
    pub fn enable_monitoring(&self, onoff: bool) -> Result<()> {
        if onoff == self.monitoring() {
            return Ok(());
        }
        self.shared
            .send_frame(&FrameHeader::new(0, 'm', 0, "", "", 0), &[])?;
        let mut state = self.shared.state.lock().expect("poisoned lock");
        state.monitor_enabled = !state.monitor_enabled;
        Ok(())
    }

    /// Current monitoring state.
    pub fn monitoring(&self) -> bool {
        self.shared
            .state
            .lock()
            .expect("poisoned lock")
            .monitor_enabled
    }

    /// Enable or disable reception of frames in raw AX.25 format. A no-op
    /// if the state would not change. Frame kind: 'k'.
    pub fn enable_raw_ax25(&self, onoff: bool) -> Result<()> {
        if onoff == self.raw_ax25() {
            return Ok(());
        }
        self.shared
            .send_frame(&FrameHeader::new(0, 'k', 0, "", "", 0), &[])?;
        let mut state = self.shared.state.lock().expect("poisoned lock");
        state.raw_enabled = !state.raw_enabled;
        Ok(())
    }

    /// Current raw-frame reception state.
    pub fn raw_ax25(&self) -> bool {
        self.shared.state.lock().expect("poisoned lock").raw_enabled
    }

    /// Authenticate with the server. There is no response frame, so success
    /// or failure is not observable. Both fields are fixed 255-byte
    /// NUL-padded slots; longer input is truncated. Frame kind: 'P'.
    pub fn login(&self, userid: &[u8], password: &[u8]) -> Result<()> {
        let mut data = [0u8; 510];
        let ulen = userid.len().min(255);
        data[..ulen].copy_from_slice(&userid[..ulen]);
        let plen = password.len().min(255);
        data[255..255 + plen].copy_from_slice(&password[..plen]);
        self.shared
            .send_frame(&FrameHeader::new(0, 'P', 0, "", "", 510), &data)
    }

    //
    // Port specific operations
    //

    /// Request capabilities for a port. The reply arrives via
    /// [`port_caps`](ReceiveHandler::port_caps) and is cached.
    /// Frame kind: 'g'.
    pub fn ask_port_caps(&self, port: u8) -> Result<()> {
        self.shared
            .send_frame(&FrameHeader::new(port, 'g', 0, "", "", 0), &[])
    }

    /// The cached capabilities for a port, populated during bring-up.
    pub fn cached_port_caps(&self, port: u8) -> Option<PortCaps> {
        self.shared
            .state
            .lock()
            .expect("poisoned lock")
            .port_caps
            .get(port as usize)
            .copied()
    }

    /// Send an unproto (UI) message, optionally via intermediary
    /// digipeaters. Frame kind: 'M', or 'V' with a via path.
    pub fn send_unproto(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        data: &[u8],
        via: Option<&[&str]>,
    ) -> Result<()> {
        match via {
            Some(via) if !via.is_empty() => {
                let mut payload = encode_via_path(via);
                payload.extend_from_slice(data);
                let header = FrameHeader::new(
                    port,
                    'V',
                    DEFAULT_PID,
                    call_from,
                    call_to,
                    payload.len() as u32,
                );
                self.shared.send_frame(&header, &payload)
            }
            _ => {
                let header =
                    FrameHeader::new(port, 'M', DEFAULT_PID, call_from, call_to, data.len() as u32);
                self.shared.send_frame(&header, data)
            }
        }
    }

    /// Initiate an AX.25 connected session. Confirmation arrives via the
    /// [`connection_received`](ReceiveHandler::connection_received)
    /// callback.
    ///
    /// The wire format supports an explicit PID only on a plain connection,
    /// so `pid` and `via` are mutually exclusive. The source callsign must
    /// already be registered. Frame kind: 'C', 'c', or 'v'.
    pub fn connect(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        via: Option<&[&str]>,
        pid: Option<u8>,
    ) -> Result<()> {
        self.require_registered(call_from)?;
        match via {
            Some(via) if !via.is_empty() => {
                if pid.is_some() {
                    return Err(EngineError::PidWithVia);
                }
                let payload = encode_via_path(via);
                let header = FrameHeader::new(
                    port,
                    'v',
                    DEFAULT_PID,
                    call_from,
                    call_to,
                    payload.len() as u32,
                );
                self.shared.send_frame(&header, &payload)
            }
            _ => {
                let (kind, pid) = match pid {
                    None => ('C', DEFAULT_PID),
                    Some(pid) => ('c', pid),
                };
                self.shared
                    .send_frame(&FrameHeader::new(port, kind, pid, call_from, call_to, 0), &[])
            }
        }
        // Confirmation happens when the server replies with a 'C' frame.
    }

    /// Send data over an open connection. The source callsign must already
    /// be registered. Frame kind: 'D'.
    pub fn send_data(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        data: &[u8],
        pid: Option<u8>,
    ) -> Result<()> {
        self.require_registered(call_from)?;
        let header = FrameHeader::new(
            port,
            'D',
            pid.unwrap_or(DEFAULT_PID),
            call_from,
            call_to,
            data.len() as u32,
        );
        self.shared.send_frame(&header, data)
    }

    /// Close a connection previously opened with
    /// [`connect`](PacketEngine::connect). Confirmation arrives via the
    /// [`disconnected`](ReceiveHandler::disconnected) callback.
    /// Frame kind: 'd'.
    pub fn disconnect(&self, port: u8, call_from: &str, call_to: &str) -> Result<()> {
        self.require_registered(call_from)?;
        self.shared.send_frame(
            &FrameHeader::new(port, 'd', DEFAULT_PID, call_from, call_to, 0),
            &[],
        )
    }

    /// Send a raw AX.25 frame to a port. Frame kind: 'K'.
    pub fn send_raw(&self, port: u8, call_from: &str, call_to: &str, data: &[u8]) -> Result<()> {
        let mut payload = BytesMut::with_capacity(1 + data.len());
        payload.put_u8(0);
        payload.extend_from_slice(data);
        let header = FrameHeader::new(port, 'K', 0, call_from, call_to, payload.len() as u32);
        self.shared.send_frame(&header, &payload)
    }

    /// Request the list of recently heard stations on a port. Replies
    /// arrive via
    /// [`callsign_heard_on_port`](ReceiveHandler::callsign_heard_on_port),
    /// one per station. Frame kind: 'H'.
    pub fn ask_callsigns_heard_on_port(&self, port: u8) -> Result<()> {
        self.shared
            .send_frame(&FrameHeader::new(port, 'H', 0, "", "", 0), &[])
    }

    /// Request the number of frames outstanding on a port. Frame kind: 'y'.
    pub fn ask_frames_waiting_on_port(&self, port: u8) -> Result<()> {
        self.shared
            .send_frame(&FrameHeader::new(port, 'y', 0, "", "", 0), &[])
    }

    /// Request the number of frames outstanding on a connection.
    /// Frame kind: 'Y'.
    pub fn ask_frames_waiting_on_connection(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
    ) -> Result<()> {
        self.shared
            .send_frame(&FrameHeader::new(port, 'Y', 0, call_from, call_to, 0), &[])
    }

    fn require_registered(&self, callsign: &str) -> Result<()> {
        if self.is_callsign_registered(callsign) {
            Ok(())
        } else {
            Err(EngineError::CallsignNotRegistered(callsign.to_string()))
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

impl Default for PacketEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PacketEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock().expect("poisoned lock");
        f.debug_struct("PacketEngine")
            .field("connected", &self.connected_to_server())
            .field("ready", &state.ready)
            .field("registered_callsigns", &state.registered_callsigns)
            .finish()
    }
}

impl Shared {
    pub(crate) fn send_frame(&self, header: &FrameHeader, payload: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().expect("poisoned lock");
        let writer = writer.as_mut().ok_or(EngineError::NotConnected)?;
        writer.send(header, payload)?;
        Ok(())
    }

    pub(crate) fn active_handler(&self) -> Arc<dyn ReceiveHandler> {
        self.active.read().expect("poisoned lock").clone()
    }

    pub(crate) fn cache_version(&self, major: u16, minor: u16) {
        self.state.lock().expect("poisoned lock").version = Some(Version { major, minor });
    }

    pub(crate) fn cache_port_info(&self, info: Vec<String>) {
        self.state.lock().expect("poisoned lock").port_info = Some(info);
    }

    pub(crate) fn cache_port_caps(&self, port: u8, caps: PortCaps) {
        let mut state = self.state.lock().expect("poisoned lock");
        if let Some(slot) = state.port_caps.get_mut(port as usize) {
            *slot = caps;
        }
    }

    pub(crate) fn register_confirmed(&self, callsign: &str) {
        let mut state = self.state.lock().expect("poisoned lock");
        if !state.registered_callsigns.iter().any(|c| c == callsign) {
            state.registered_callsigns.push(callsign.to_string());
        }
    }

    fn notify_observers(&self, f: impl Fn(&dyn EngineObserver)) {
        let observers = self.observers.lock().expect("poisoned lock").clone();
        for observer in &observers {
            f(observer.as_ref());
        }
    }

    /// Body of the receive thread: reassemble and dispatch frames until the
    /// stream ends.
    fn receive_loop(self: Arc<Self>, stream: EngineStream) {
        let mut reader = FrameReader::new(stream);
        loop {
            match reader.read_frame() {
                Ok(frame) => dispatch::dispatch(&self, &frame),
                Err(FrameError::ConnectionClosed) => break,
                Err(FrameError::Io(err)) if is_disconnect(&err) => break,
                Err(err) => {
                    error!(%err, "fatal receive error");
                    break;
                }
            }
        }
        self.finish_receive();
    }

    /// Tear down after the receive loop ends. When the loop ended on its
    /// own (server went away), the stream handles are still registered and
    /// observers have not yet heard about the disconnect.
    fn finish_receive(&self) {
        let stream = self.stream.lock().expect("poisoned lock").take();
        if stream.is_some() {
            *self.writer.lock().expect("poisoned lock") = None;
            self.state.lock().expect("poisoned lock").ready = false;
            debug!("server connection ended");
            // Release anyone still blocked in connect_to_server; they will
            // see a not-ready engine and fail the call.
            self.ready.notify();
            self.notify_observers(|o| o.server_disconnected());
        }
    }
}

impl BringupLink for Shared {
    fn request_version(&self) {
        if let Err(err) = self.send_frame(&FrameHeader::new(0, 'R', 0, "", "", 0), &[]) {
            error!(%err, "version request failed");
        }
    }

    fn request_port_info(&self) {
        if let Err(err) = self.send_frame(&FrameHeader::new(0, 'G', 0, "", "", 0), &[]) {
            error!(%err, "port info request failed");
        }
    }

    fn request_port_caps(&self, port: u8) {
        if let Err(err) = self.send_frame(&FrameHeader::new(port, 'g', 0, "", "", 0), &[]) {
            error!(%err, "port caps request failed");
        }
    }

    fn bringup_complete(
        &self,
        version: (u16, u16),
        port_info: Vec<String>,
        port_caps: Vec<PortCaps>,
    ) {
        {
            let mut state = self.state.lock().expect("poisoned lock");
            state.version = Some(Version {
                major: version.0,
                minor: version.1,
            });
            state.port_info = Some(port_info);
            state.port_caps = port_caps;
            state.ready = true;
        }
        let client = self.client_handler.read().expect("poisoned lock").clone();
        *self.active.write().expect("poisoned lock") = client;
        info!("packet engine ready");
        self.ready.notify();
        self.notify_observers(|o| o.engine_ready());
    }
}

/// Encode a digipeater path: a count byte followed by one fixed-width
/// callsign field per intermediary.
fn encode_via_path(via: &[&str]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1 + via.len() * CALL_SIZE);
    buf.put_u8(via.len() as u8);
    for call in via {
        put_callsign(&mut buf, call);
    }
    buf
}
