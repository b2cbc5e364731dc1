use thiserror::Error;

use pinchot_discovery::DiscoveryError;
use pinchot_phase::PhaseError;
use pinchot_profile_receiver::ReceiverError;
use pinchot_queue::QueueError;
use pinchot_scan_head::ScanHeadError;

/// Top-level error type for the orchestrator. A fan-out across heads that
/// partially fails is reported as `PartialConnect`/`PartialStart` rather
/// than an opaque aggregate, so callers can tell which heads need retrying.
#[derive(Debug, Error)]
pub enum ScanSystemError {
    #[error("scan head id {0} is already registered")]
    DuplicateHeadId(u32),

    #[error("no scan head registered with id {0}")]
    UnknownHeadId(u32),

    #[error("{0:?} failed to connect within the deadline")]
    PartialConnect(Vec<u32>),

    #[error("{0:?} failed to start scanning; heads that did start were stopped")]
    PartialStart(Vec<u32>),

    #[error("{0:?} failed to stop cleanly")]
    PartialStop(Vec<u32>),

    #[error("phase table rejected: {0}")]
    Phase(#[from] PhaseError),

    #[error("scan head error: {0}")]
    ScanHead(#[from] ScanHeadError),

    #[error("failed to bind a profile receiver for head {head_id}: {source}")]
    Receiver {
        head_id: u32,
        #[source]
        source: ReceiverError,
    },

    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("calibration lookup failed for head {head_id}: {reason}")]
    Calibration { head_id: u32, reason: String },

    #[error("no phase table has been set")]
    NoPhaseTable,

    #[error("scan system is not currently scanning")]
    NotScanning,

    #[error("frame queue error: {0}")]
    Queue(#[from] QueueError),
}
