use std::sync::{Arc, RwLock};

use agwio_engine::ReceiveHandler;
use agwio_frame::{HeardCall, PortCaps};

/// A receive handler that fans out to an ordered list of handlers.
///
/// Handlers are invoked in the order they were added, one after another, for
/// every callback. Adding a handler that is already present is a no-op.
#[derive(Default)]
pub struct MultiReceiveHandler {
    handlers: RwLock<Vec<Arc<dyn ReceiveHandler>>>,
}

impl MultiReceiveHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to the end of the chain. Returns `&self` so calls
    /// can be strung together.
    pub fn add_handler(&self, handler: Arc<dyn ReceiveHandler>) -> &Self {
        let mut handlers = self.handlers.write().expect("poisoned lock");
        if !handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            handlers.push(handler);
        }
        self
    }

    /// Remove a handler from the chain, if present.
    pub fn remove_handler(&self, handler: &Arc<dyn ReceiveHandler>) -> &Self {
        let mut handlers = self.handlers.write().expect("poisoned lock");
        handlers.retain(|h| !Arc::ptr_eq(h, handler));
        self
    }

    /// Number of handlers in the chain.
    pub fn len(&self) -> usize {
        self.handlers.read().expect("poisoned lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the chain, so a handler can mutate it mid-callback
    /// without deadlocking the fan-out.
    fn chain(&self) -> Vec<Arc<dyn ReceiveHandler>> {
        self.handlers.read().expect("poisoned lock").clone()
    }
}

impl ReceiveHandler for MultiReceiveHandler {
    fn version_info(&self, major: u16, minor: u16) {
        for h in self.chain() {
            h.version_info(major, minor);
        }
    }

    fn callsign_registered(&self, callsign: &str, success: bool) {
        for h in self.chain() {
            h.callsign_registered(callsign, success);
        }
    }

    fn port_info(&self, info: &[String]) {
        for h in self.chain() {
            h.port_info(info);
        }
    }

    fn port_caps(&self, port: u8, caps: &PortCaps) {
        for h in self.chain() {
            h.port_caps(port, caps);
        }
    }

    fn callsign_heard_on_port(&self, port: u8, heard: Option<&HeardCall>) {
        for h in self.chain() {
            h.callsign_heard_on_port(port, heard);
        }
    }

    fn frames_waiting_on_port(&self, port: u8, frames: u32) {
        for h in self.chain() {
            h.frames_waiting_on_port(port, frames);
        }
    }

    fn connection_received(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        incoming: bool,
        message: &str,
    ) {
        for h in self.chain() {
            h.connection_received(port, call_from, call_to, incoming, message);
        }
    }

    fn connected_data(&self, port: u8, call_from: &str, call_to: &str, pid: u8, data: &[u8]) {
        for h in self.chain() {
            h.connected_data(port, call_from, call_to, pid, data);
        }
    }

    fn disconnected(&self, port: u8, call_from: &str, call_to: &str, message: &str) {
        for h in self.chain() {
            h.disconnected(port, call_from, call_to, message);
        }
    }

    fn frames_waiting_on_connection(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        frames: u32,
    ) {
        for h in self.chain() {
            h.frames_waiting_on_connection(port, call_from, call_to, frames);
        }
    }

    fn monitored_connected(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) {
        for h in self.chain() {
            h.monitored_connected(port, call_from, call_to, text, data);
        }
    }

    fn monitored_supervisory(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
    ) {
        for h in self.chain() {
            h.monitored_supervisory(port, call_from, call_to, text);
        }
    }

    fn monitored_unproto(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) {
        for h in self.chain() {
            h.monitored_unproto(port, call_from, call_to, text, data);
        }
    }

    fn monitored_own(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) {
        for h in self.chain() {
            h.monitored_own(port, call_from, call_to, text, data);
        }
    }

    fn monitored_raw(&self, port: u8, data: &[u8]) {
        for h in self.chain() {
            h.monitored_raw(port, data);
        }
    }
}
