use tokio::time::Instant;

use pinchot_wire::{ControlRequest, ControlResponse};

use crate::error::ScanHeadError;

/// Seam between the state machine and the control channel. Implemented by
/// the infra layer (one logical connection per head, FIFO-serialised
/// requests); kept as a trait here so this crate has no dependency on
/// sockets, reconnect policy, or transport framing.
#[async_trait::async_trait]
pub trait ControlTransport: Send + Sync {
    async fn send(
        &self,
        request: ControlRequest,
        deadline: Instant,
    ) -> Result<ControlResponse, ScanHeadError>;

    /// Whether the underlying connection is currently believed healthy.
    /// A `false` here does not block calls; it is informational for
    /// `RequestStatus`-style diagnostics.
    fn is_stale(&self) -> bool;
}
