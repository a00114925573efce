//! Frame kind catalog.
//!
//! Each kind is a single ASCII character; the catalog records what payload
//! length is legal in each direction. Inbound frames are validated against
//! the receive rule before any listener sees them.

/// Payload length rule for one direction of a frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LenRule {
    /// Exactly this many payload bytes.
    Fixed(u32),
    /// Any payload length.
    Variable,
    /// The kind is not valid in this direction.
    NotPermitted,
}

/// Catalog entry for a single frame kind.
#[derive(Debug, Clone, Copy)]
pub struct KindInfo {
    pub kind: char,
    /// Rule for frames sent to the server.
    pub send: LenRule,
    /// Rule for frames received from the server.
    pub recv: LenRule,
    pub name: &'static str,
}

use LenRule::{Fixed, NotPermitted, Variable};

const CATALOG: &[KindInfo] = &[
    KindInfo { kind: 'P', send: Variable, recv: NotPermitted, name: "Application Login" },
    KindInfo { kind: 'R', send: Fixed(0), recv: Fixed(8), name: "AGWPE Version Info" },
    KindInfo { kind: 'G', send: Fixed(0), recv: Variable, name: "Port Information" },
    KindInfo { kind: 'g', send: Fixed(0), recv: Fixed(12), name: "Port Capabilities" },
    KindInfo { kind: 'X', send: Fixed(0), recv: Fixed(1), name: "Callsign Registration" },
    KindInfo { kind: 'x', send: Fixed(0), recv: NotPermitted, name: "Unregister Callsign" },
    KindInfo { kind: 'y', send: Fixed(0), recv: Fixed(4), name: "Frames Outstanding on a Port" },
    KindInfo { kind: 'Y', send: Fixed(0), recv: Fixed(4), name: "Frames Outstanding on a Connection" },
    KindInfo { kind: 'H', send: Fixed(0), recv: Variable, name: "Heard Stations on a Port" },
    KindInfo { kind: 'm', send: Fixed(0), recv: NotPermitted, name: "Enable Reception of Monitoring Frames" },
    KindInfo { kind: 'M', send: Variable, recv: NotPermitted, name: "Send Unproto Information" },
    KindInfo { kind: 'V', send: Variable, recv: NotPermitted, name: "Send Unproto VIA" },
    KindInfo { kind: 'C', send: Fixed(0), recv: Variable, name: "AX.25 Connection" },
    KindInfo { kind: 'v', send: Variable, recv: NotPermitted, name: "Connect an AX.25 circuit thru digipeaters" },
    KindInfo { kind: 'c', send: Fixed(0), recv: NotPermitted, name: "Non-Standard Connections, Connection with PID" },
    KindInfo { kind: 'D', send: Variable, recv: Variable, name: "Connected AX.25 Data" },
    KindInfo { kind: 'd', send: Fixed(0), recv: Variable, name: "Disconnect, Terminate an AX.25 Connection" },
    KindInfo { kind: 'U', send: NotPermitted, recv: Variable, name: "Monitored Unproto Information" },
    KindInfo { kind: 'I', send: NotPermitted, recv: Variable, name: "Monitored Connected Information" },
    KindInfo { kind: 'S', send: NotPermitted, recv: Variable, name: "Monitored Supervisory Information" },
    KindInfo { kind: 'T', send: NotPermitted, recv: Variable, name: "Monitoring Own Information" },
    KindInfo { kind: 'K', send: Variable, recv: Variable, name: "Monitored Information in Raw Format" },
    KindInfo { kind: 'k', send: Fixed(0), recv: NotPermitted, name: "Activate reception of Frames in raw format" },
];

/// Look up the catalog entry for a frame kind. `None` means the kind is
/// unknown to the protocol.
pub fn kind_info(kind: char) -> Option<&'static KindInfo> {
    CATALOG.iter().find(|info| info.kind == kind)
}
