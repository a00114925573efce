use std::sync::Arc;

use agwio_engine::{
    AcceptPolicy, Connection, ConnectionFactory, Connections, EngineError, PacketEngine,
    ReceiveHandler, Result, Version,
};
use agwio_frame::PortCaps;

use crate::chain::MultiReceiveHandler;
use crate::debug::DebugReceiveHandler;
use crate::monitor::{Monitor, MonitorReceiveHandler};

/// Top-level application object for interacting with a packet engine.
///
/// Owns an engine instance and a connection registry and wires the standard
/// receive handler chain (debug logging, connection routing, monitor
/// delegation, plus an optional custom handler). Configure it, then call
/// [`start`](Application::start); the call blocks until the engine is ready.
///
/// Most programs should use this rather than driving [`PacketEngine`]
/// directly.
pub struct Application {
    engine: Option<PacketEngine>,
    connections: Option<Connections>,
    debug_handler: Arc<DebugReceiveHandler>,
    monitor_handler: Arc<MonitorReceiveHandler>,
    custom_handler: Option<Arc<dyn ReceiveHandler>>,
    connection_factory: Option<ConnectionFactory>,
    accept_policy: Option<AcceptPolicy>,
}

impl Application {
    pub fn new() -> Self {
        Self {
            engine: None,
            connections: None,
            debug_handler: Arc::new(DebugReceiveHandler::new()),
            monitor_handler: Arc::new(MonitorReceiveHandler::new()),
            custom_handler: None,
            connection_factory: None,
            accept_policy: None,
        }
    }

    //
    // Configuration, before start()
    //

    /// Supply the factory that builds a handler for each connected-mode
    /// session. Without one, [`open_connection`](Application::open_connection)
    /// fails and incoming connections are refused.
    pub fn use_connection_factory(&mut self, factory: ConnectionFactory) {
        self.connection_factory = Some(factory);
    }

    /// Supply the policy consulted for incoming connections. The default
    /// refuses everything.
    pub fn use_accept_policy(&mut self, policy: AcceptPolicy) {
        self.accept_policy = Some(policy);
    }

    /// Add an application-specific receive handler at the end of the chain.
    pub fn use_custom_handler(&mut self, handler: Arc<dyn ReceiveHandler>) {
        self.custom_handler = Some(handler);
    }

    /// Set the monitor that receives monitored-traffic callbacks.
    pub fn use_monitor(&mut self, monitor: Arc<dyn Monitor>) {
        self.monitor_handler.set_monitor(Some(monitor));
    }

    //
    // Start / stop
    //

    /// Connect to the packet engine server and run bring-up.
    ///
    /// Blocks until the engine is ready for use. Calling it while already
    /// started is a no-op.
    pub fn start(&mut self, host: &str, port: u16) -> Result<()> {
        if self.engine.is_some() {
            return Ok(());
        }

        let engine = PacketEngine::new();
        let chain = Arc::new(MultiReceiveHandler::new());
        chain.add_handler(self.debug_handler.clone());

        let connections = self.connection_factory.clone().map(|factory| {
            let accept = self
                .accept_policy
                .clone()
                .unwrap_or_else(|| Arc::new(|_, _, _| false));
            Connections::new(engine.clone(), factory, accept)
        });
        if let Some(connections) = &connections {
            chain.add_handler(connections.receive_handler());
        }

        chain.add_handler(self.monitor_handler.clone());
        if let Some(custom) = &self.custom_handler {
            chain.add_handler(custom.clone());
        }

        engine.set_receive_handler(chain);
        engine.connect_to_server(host, port)?;

        self.connections = connections;
        self.engine = Some(engine);
        Ok(())
    }

    /// Disconnect from the server and drop the engine. A stopped
    /// application can be started again.
    pub fn stop(&mut self) {
        if let Some(engine) = self.engine.take() {
            if engine.connected_to_server() {
                let _ = engine.disconnect_from_server();
            }
        }
        self.connections = None;
    }

    //
    // System properties
    //

    /// Whether the client is currently connected to the server.
    pub fn connected_to_server(&self) -> bool {
        self.engine
            .as_ref()
            .is_some_and(PacketEngine::connected_to_server)
    }

    /// The cached server version, populated during bring-up.
    pub fn version_info(&self) -> Option<Version> {
        self.engine.as_ref().and_then(PacketEngine::version_info)
    }

    /// The cached port list, populated during bring-up.
    pub fn port_info(&self) -> Option<Vec<String>> {
        self.engine.as_ref().and_then(PacketEngine::cached_port_info)
    }

    /// The cached capabilities for a port, populated during bring-up.
    pub fn port_caps(&self, port: u8) -> Option<PortCaps> {
        self.engine
            .as_ref()
            .and_then(|engine| engine.cached_port_caps(port))
    }

    /// The underlying engine, for programs that need the low-level
    /// operation set.
    pub fn engine(&self) -> Option<&PacketEngine> {
        self.engine.as_ref()
    }

    //
    // Unproto
    //

    /// Send an unproto (UI) message, optionally via intermediaries.
    pub fn send_unproto(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        data: &[u8],
        via: Option<&[&str]>,
    ) -> Result<()> {
        let engine = self.engine.as_ref().ok_or(EngineError::NotConnected)?;
        engine.send_unproto(port, call_from, call_to, data, via)
    }

    //
    // Connections
    //

    /// Register one or more callsigns with the server. Registration
    /// completes asynchronously, when the server confirms.
    pub fn register_callsigns(&self, callsigns: &[&str]) -> Result<()> {
        let engine = self.engine.as_ref().ok_or(EngineError::NotConnected)?;
        for callsign in callsigns {
            engine.register_callsign(callsign)?;
        }
        Ok(())
    }

    /// Whether a callsign has completed registration.
    pub fn is_callsign_registered(&self, callsign: &str) -> bool {
        self.engine
            .as_ref()
            .is_some_and(|engine| engine.is_callsign_registered(callsign))
    }

    /// Open a new connected-mode session.
    pub fn open_connection(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        via: Option<&[&str]>,
    ) -> Result<Arc<Connection>> {
        if self.engine.is_none() {
            return Err(EngineError::NotConnected);
        }
        let connections = self
            .connections
            .as_ref()
            .ok_or(EngineError::NoConnectionFactory)?;
        connections.open(port, call_from, call_to, via)
    }

    //
    // Monitoring
    //

    /// Enable or disable monitoring on the engine.
    pub fn set_monitoring(&self, onoff: bool) -> Result<()> {
        let engine = self.engine.as_ref().ok_or(EngineError::NotConnected)?;
        engine.enable_monitoring(onoff)
    }

    /// Current monitoring state.
    pub fn monitoring(&self) -> bool {
        self.engine.as_ref().is_some_and(PacketEngine::monitoring)
    }

    //
    // Debugging output
    //

    /// Enable or disable debug logging of every received frame.
    pub fn set_debug_output(&self, onoff: bool) {
        self.debug_handler.set_output_enabled(onoff);
    }

    /// Current state of debug output.
    pub fn debug_output(&self) -> bool {
        self.debug_handler.output_enabled()
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_before_start_fail_cleanly() {
        let app = Application::new();
        assert!(!app.connected_to_server());
        assert!(app.version_info().is_none());
        assert!(app.port_info().is_none());
        assert!(app.port_caps(0).is_none());
        assert!(!app.is_callsign_registered("N0CALL"));
        assert!(!app.monitoring());

        assert!(matches!(
            app.send_unproto(0, "N0CALL", "CQ", b"x", None),
            Err(EngineError::NotConnected)
        ));
        assert!(matches!(
            app.register_callsigns(&["N0CALL"]),
            Err(EngineError::NotConnected)
        ));
        assert!(matches!(
            app.open_connection(0, "N0CALL", "N1CALL", None),
            Err(EngineError::NotConnected)
        ));
        assert!(matches!(
            app.set_monitoring(true),
            Err(EngineError::NotConnected)
        ));
    }

    #[test]
    fn debug_output_toggle() {
        let app = Application::new();
        assert!(!app.debug_output());
        app.set_debug_output(true);
        assert!(app.debug_output());
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let mut app = Application::new();
        app.stop();
        assert!(!app.connected_to_server());
    }
}
