use std::sync::{Arc, RwLock};

use agwio_engine::ReceiveHandler;

/// Callbacks for monitored radio traffic.
///
/// Implement this to observe frames the engine forwards when monitoring is
/// enabled, without having to write a full [`ReceiveHandler`].
pub trait Monitor: Send + Sync {
    /// Monitored AX.25 Information (I) frame. Frame kind: 'I'.
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

    /// An unproto frame sent by this client, echoed back. Frame kind: 'T'.
    fn monitored_own(
        &self,
        _port: u8,
        _call_from: &str,
        _call_to: &str,
        _text: Option<&str>,
        _data: &[u8],
    ) {
    }

    /// A monitored frame in raw AX.25 format. Frame kind: 'K'.
    fn monitored_raw(&self, _port: u8, _data: &[u8]) {}
}

/// Delegates monitoring callbacks to a [`Monitor`] instance.
///
/// With no monitor set, every callback is dropped, so enabling monitoring
/// on the engine has no visible effect until a monitor is attached.
#[derive(Default)]
pub struct MonitorReceiveHandler {
    monitor: RwLock<Option<Arc<dyn Monitor>>>,
}

impl MonitorReceiveHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach or detach the monitor.
    pub fn set_monitor(&self, monitor: Option<Arc<dyn Monitor>>) {
        *self.monitor.write().expect("poisoned lock") = monitor;
    }

    /// The currently attached monitor.
    pub fn monitor(&self) -> Option<Arc<dyn Monitor>> {
        self.monitor.read().expect("poisoned lock").clone()
    }
}

impl ReceiveHandler for MonitorReceiveHandler {
    fn monitored_connected(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) {
        if let Some(monitor) = self.monitor() {
            monitor.monitored_connected(port, call_from, call_to, text, data);
        }
    }

    fn monitored_supervisory(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
    ) {
        if let Some(monitor) = self.monitor() {
            monitor.monitored_supervisory(port, call_from, call_to, text);
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
        if let Some(monitor) = self.monitor() {
            monitor.monitored_unproto(port, call_from, call_to, text, data);
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
        if let Some(monitor) = self.monitor() {
            monitor.monitored_own(port, call_from, call_to, text, data);
        }
    }

    fn monitored_raw(&self, port: u8, data: &[u8]) {
        if let Some(monitor) = self.monitor() {
            monitor.monitored_raw(port, data);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingMonitor {
        events: Mutex<Vec<String>>,
    }

    impl Monitor for RecordingMonitor {
        fn monitored_unproto(
            &self,
            port: u8,
            call_from: &str,
            _call_to: &str,
            text: Option<&str>,
            _data: &[u8],
        ) {
            self.events.lock().unwrap().push(format!(
                "unproto:{port}:{call_from}:{}",
                text.unwrap_or("-")
            ));
        }

        fn monitored_raw(&self, port: u8, data: &[u8]) {
            self.events
                .lock()
                .unwrap()
                .push(format!("raw:{port}:{}", data.len()));
        }
    }

    #[test]
    fn delegates_when_monitor_attached() {
        let handler = MonitorReceiveHandler::new();
        let monitor = Arc::new(RecordingMonitor::default());
        handler.set_monitor(Some(monitor.clone()));

        handler.monitored_unproto(0, "N0CALL", "CQ", Some("header"), b"data");
        handler.monitored_raw(1, b"raw-bytes");

        assert_eq!(
            monitor.events.lock().unwrap().clone(),
            vec!["unproto:0:N0CALL:header", "raw:1:9"]
        );
    }

    #[test]
    fn drops_everything_without_a_monitor() {
        let handler = MonitorReceiveHandler::new();
        handler.monitored_unproto(0, "N0CALL", "CQ", None, b"data");
        handler.monitored_raw(0, b"raw");
        assert!(handler.monitor().is_none());
    }

    #[test]
    fn detaching_stops_delegation() {
        let handler = MonitorReceiveHandler::new();
        let monitor = Arc::new(RecordingMonitor::default());
        handler.set_monitor(Some(monitor.clone()));
        handler.monitored_raw(0, b"one");

        handler.set_monitor(None);
        handler.monitored_raw(0, b"two");

        assert_eq!(monitor.events.lock().unwrap().len(), 1);
    }
}
