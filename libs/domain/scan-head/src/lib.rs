//! One scan head's state machine, dirty-flag tracking, and scan lifecycle.
//!
//! This crate knows how to transition a head through
//! Disconnected/Connected/Scanning/IdleScanning, which operations are legal
//! in which state, and how to drain dirty configuration facets before
//! scanning starts. It depends on `pinchot-wire` for the control-message
//! shapes and on `pinchot-queue` for the per-element queues it hands out at
//! `StartScanning`, but it has no socket of its own: control requests go
//! through the `ControlTransport` seam, implemented by the infra layer.

pub mod error;
pub mod scan_head;
pub mod state;
pub mod transport;

pub use error::ScanHeadError;
pub use scan_head::{Alignment, Orientation, ScanHead, ScanHeadCounters};
pub use state::{Operation, ScanHeadState};
pub use transport::ControlTransport;
