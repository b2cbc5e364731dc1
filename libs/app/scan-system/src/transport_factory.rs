use std::net::SocketAddr;
use std::sync::Arc;

use pinchot_control_channel::TcpControlTransport;
use pinchot_scan_head::ControlTransport;

/// Builds the control-channel transport for one head's address. A trait
/// rather than a bare constructor so tests can substitute an in-memory
/// transport without a real socket (§9 design notes: the orchestrator has
/// no hard dependency on TCP).
pub trait ControlTransportFactory: Send + Sync {
    fn create(&self, addr: SocketAddr) -> Arc<dyn ControlTransport>;
}

/// Default factory: one `TcpControlTransport` per head address.
pub struct TcpTransportFactory;

impl ControlTransportFactory for TcpTransportFactory {
    fn create(&self, addr: SocketAddr) -> Arc<dyn ControlTransport> {
        Arc::new(TcpControlTransport::new(addr))
    }
}
