//! Bring-up sequencing.
//!
//! Connecting to a packet engine requires a mandatory exchange before the
//! client is usable: version, then the port list, then capabilities for
//! every port. [`BootstrapHandler`] is installed as the active receive
//! handler for the duration and collapses the whole sequence into a single
//! completion hand-off.

use std::sync::{Mutex, Weak};

use agwio_frame::PortCaps;

use crate::handler::ReceiveHandler;

/// Bring-up progress for one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadyState {
    New,
    WaitingVersion,
    WaitingPortInfo,
    WaitingPortCaps,
    Ready,
}

/// The requests the bring-up sequence issues, and its completion hand-off.
///
/// The engine implements this; tests substitute a recording fake.
pub(crate) trait BringupLink: Send + Sync {
    fn request_version(&self);
    fn request_port_info(&self);
    fn request_port_caps(&self, port: u8);

    /// Called exactly once, when the sequence reaches READY. Ownership of
    /// the collected data transfers to the engine.
    fn bringup_complete(
        &self,
        version: (u16, u16),
        port_info: Vec<String>,
        port_caps: Vec<PortCaps>,
    );
}

struct BootstrapState {
    phase: ReadyState,
    version: Option<(u16, u16)>,
    port_info: Vec<String>,
    port_caps: Vec<PortCaps>,
}

/// Receive handler active while bring-up runs.
///
/// Replies arriving in the wrong phase are ignored; they are stray late
/// replies from a previous connection attempt.
pub(crate) struct BootstrapHandler {
    link: Weak<dyn BringupLink>,
    state: Mutex<BootstrapState>,
}

impl BootstrapHandler {
    pub(crate) fn new(link: Weak<dyn BringupLink>) -> Self {
        Self {
            link,
            state: Mutex::new(BootstrapState {
                phase: ReadyState::New,
                version: None,
                port_info: Vec::new(),
                port_caps: Vec::new(),
            }),
        }
    }

    /// Kick off the sequence by requesting the server version. Calling this
    /// again once started is a no-op.
    pub(crate) fn start(&self) {
        let Some(link) = self.link.upgrade() else {
            return;
        };
        {
            let mut state = self.state.lock().expect("poisoned lock");
            if state.phase != ReadyState::New {
                return;
            }
            state.phase = ReadyState::WaitingVersion;
        }
        link.request_version();
    }

    fn finish(&self, link: &dyn BringupLink) {
        let (version, port_info, port_caps) = {
            let mut state = self.state.lock().expect("poisoned lock");
            (
                state.version.unwrap_or((0, 0)),
                std::mem::take(&mut state.port_info),
                std::mem::take(&mut state.port_caps),
            )
        };
        link.bringup_complete(version, port_info, port_caps);
    }
}

impl ReceiveHandler for BootstrapHandler {
    fn version_info(&self, major: u16, minor: u16) {
        let Some(link) = self.link.upgrade() else {
            return;
        };
        {
            let mut state = self.state.lock().expect("poisoned lock");
            if state.phase != ReadyState::WaitingVersion {
                return;
            }
            state.version = Some((major, minor));
            state.phase = ReadyState::WaitingPortInfo;
        }
        link.request_port_info();
    }

    fn port_info(&self, info: &[String]) {
        let Some(link) = self.link.upgrade() else {
            return;
        };
        let complete = {
            let mut state = self.state.lock().expect("poisoned lock");
            if state.phase != ReadyState::WaitingPortInfo {
                return;
            }
            state.port_info = info.to_vec();
            if info.is_empty() {
                // No ports to query; go straight to ready.
                state.phase = ReadyState::Ready;
                true
            } else {
                state.phase = ReadyState::WaitingPortCaps;
                false
            }
        };
        if complete {
            self.finish(link.as_ref());
        } else {
            link.request_port_caps(0);
        }
    }

    fn port_caps(&self, port: u8, caps: &PortCaps) {
        let Some(link) = self.link.upgrade() else {
            return;
        };
        let complete = {
            let mut state = self.state.lock().expect("poisoned lock");
            if state.phase != ReadyState::WaitingPortCaps {
                return;
            }
            state.port_caps.push(*caps);
            if state.port_caps.len() == state.port_info.len() {
                state.phase = ReadyState::Ready;
                true
            } else {
                false
            }
        };
        if complete {
            self.finish(link.as_ref());
        } else {
            link.request_port_caps(port + 1);
        }
    }
}
