use agwio_frame::{HeardCall, PortCaps};

/// Callbacks for frames received from the packet engine server.
///
/// Every method has an empty default implementation, so implementors only
/// override the frame kinds they care about. Methods are invoked on the
/// engine's receive thread, one frame at a time.
pub trait ReceiveHandler: Send + Sync {
    /// Server version reply. Frame kind: 'R'.
    fn version_info(&self, _major: u16, _minor: u16) {}

    /// Result of a callsign registration attempt. Frame kind: 'X'.
    fn callsign_registered(&self, _callsign: &str, _success: bool) {}

    /// Available port descriptions. Frame kind: 'G'.
    fn port_info(&self, _info: &[String]) {}

    /// Capabilities for one port. Frame kind: 'g'.
    fn port_caps(&self, _port: u8, _caps: &PortCaps) {}

    /// One heard-station record; `None` when the server padded its reply
    /// with a placeholder. May be called several times per request, once
    /// per station. Frame kind: 'H'.
    fn callsign_heard_on_port(&self, _port: u8, _heard: Option<&HeardCall>) {}

    /// Outstanding frame count for a port. Frame kind: 'y'.
    fn frames_waiting_on_port(&self, _port: u8, _frames: u32) {}

    /// A new connection, whether initiated locally (`incoming` false) or by
    /// a remote station (`incoming` true). Frame kind: 'C'.
    fn connection_received(
        &self,
        _port: u8,
        _call_from: &str,
        _call_to: &str,
        _incoming: bool,
        _message: &str,
    ) {
    }

    /// Data on an open connection. Frame kind: 'D'.
    fn connected_data(&self, _port: u8, _call_from: &str, _call_to: &str, _pid: u8, _data: &[u8]) {
    }

    /// A connection ended, whether by the client, the remote station, or a
    /// timeout. Frame kind: 'd'.
    fn disconnected(&self, _port: u8, _call_from: &str, _call_to: &str, _message: &str) {}

    /// Outstanding frame count for a connection. Frame kind: 'Y'.
    fn frames_waiting_on_connection(
        &self,
        _port: u8,
        _call_from: &str,
        _call_to: &str,
        _frames: u32,
    ) {
    }

    /// Monitored AX.25 Information (I) frame, when monitoring is enabled.
    /// Frame kind: 'I'.
    fn monitored_connected(
        &self,
        _port: u8,
        _call_from: &str,
        _call_to: &str,
        _text: Option<&str>,
        _data: &[u8],
    ) {
    }

    /// Monitored AX.25 Supervisory (S) frame. Frame kind: 'S'.
    fn monitored_supervisory(
        &self,
        _port: u8,
        _call_from: &str,
        _call_to: &str,
        _text: Option<&str>,
    ) {
    }

    /// Monitored AX.25 Unproto (U) frame. Frame kind: 'U'.
    fn monitored_unproto(
        &self,
        _port: u8,
        _call_from: &str,
        _call_to: &str,
        _text: Option<&str>,
        _data: &[u8],
    ) {
    }

    /// An unproto frame sent by this client, echoed back for confirmation.
    /// Frame kind: 'T'.
    fn monitored_own(
        &self,
        _port: u8,
        _call_from: &str,
        _call_to: &str,
        _text: Option<&str>,
        _data: &[u8],
    ) {
    }

    /// A monitored frame in raw AX.25 format, when raw reception is
    /// enabled. Frame kind: 'K'.
    fn monitored_raw(&self, _port: u8, _data: &[u8]) {}
}

/// A receive handler that ignores every frame.
#[derive(Debug, Default)]
pub struct NullReceiveHandler;

impl ReceiveHandler for NullReceiveHandler {}
