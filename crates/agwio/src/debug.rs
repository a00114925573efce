use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use agwio_engine::ReceiveHandler;
use agwio_frame::{HeardCall, PortCaps};

/// A receive handler that logs each callback with its arguments.
///
/// Output goes to `tracing` at debug level and is gated by an enable flag,
/// so the handler can stay in the chain permanently and be switched on when
/// needed.
#[derive(Debug, Default)]
pub struct DebugReceiveHandler {
    enabled: AtomicBool,
}

impl DebugReceiveHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable debug output.
    pub fn set_output_enabled(&self, onoff: bool) {
        self.enabled.store(onoff, Ordering::Relaxed);
    }

    /// Current state of debug output.
    pub fn output_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl ReceiveHandler for DebugReceiveHandler {
    fn version_info(&self, major: u16, minor: u16) {
        if self.output_enabled() {
            debug!(major, minor, "version_info");
        }
    }

    fn callsign_registered(&self, callsign: &str, success: bool) {
        if self.output_enabled() {
            debug!(callsign, success, "callsign_registered");
        }
    }

    fn port_info(&self, info: &[String]) {
        if self.output_enabled() {
            debug!(?info, "port_info");
        }
    }

    fn port_caps(&self, port: u8, caps: &PortCaps) {
        if self.output_enabled() {
            debug!(port, ?caps, "port_caps");
        }
    }

    fn callsign_heard_on_port(&self, port: u8, heard: Option<&HeardCall>) {
        if self.output_enabled() {
            debug!(port, ?heard, "callsign_heard_on_port");
        }
    }

    fn frames_waiting_on_port(&self, port: u8, frames: u32) {
        if self.output_enabled() {
            debug!(port, frames, "frames_waiting_on_port");
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
        if self.output_enabled() {
            debug!(port, call_from, call_to, incoming, message, "connection_received");
        }
    }

    fn connected_data(&self, port: u8, call_from: &str, call_to: &str, pid: u8, data: &[u8]) {
        if self.output_enabled() {
            debug!(
                port,
                call_from,
                call_to,
                pid,
                len = data.len(),
                "connected_data"
            );
        }
    }

    fn disconnected(&self, port: u8, call_from: &str, call_to: &str, message: &str) {
        if self.output_enabled() {
            debug!(port, call_from, call_to, message, "disconnected");
        }
    }

    fn frames_waiting_on_connection(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        frames: u32,
    ) {
        if self.output_enabled() {
            debug!(port, call_from, call_to, frames, "frames_waiting_on_connection");
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
        if self.output_enabled() {
            debug!(
                port,
                call_from,
                call_to,
                text,
                len = data.len(),
                "monitored_connected"
            );
        }
    }

    fn monitored_supervisory(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
    ) {
        if self.output_enabled() {
            debug!(port, call_from, call_to, text, "monitored_supervisory");
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
        if self.output_enabled() {
            debug!(
                port,
                call_from,
                call_to,
                text,
                len = data.len(),
                "monitored_unproto"
            );
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
        if self.output_enabled() {
            debug!(
                port,
                call_from,
                call_to,
                text,
                len = data.len(),
                "monitored_own"
            );
        }
    }

    fn monitored_raw(&self, port: u8, data: &[u8]) {
        if self.output_enabled() {
            debug!(port, len = data.len(), "monitored_raw");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default() {
        let handler = DebugReceiveHandler::new();
        assert!(!handler.output_enabled());
        handler.set_output_enabled(true);
        assert!(handler.output_enabled());
        handler.set_output_enabled(false);
        assert!(!handler.output_enabled());
    }

    #[test]
    fn callbacks_are_safe_in_both_states() {
        let handler = DebugReceiveHandler::new();
        handler.version_info(1, 2);
        handler.set_output_enabled(true);
        handler.version_info(1, 2);
        handler.monitored_raw(0, b"data");
        handler.callsign_heard_on_port(0, None);
    }
}
