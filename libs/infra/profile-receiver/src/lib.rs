//! UDP profile-packet receiver and reassembler (§4.4).
//!
//! One `ProfileReceiver` owns a single head's data socket, reassembles
//! fragments keyed by (camera, laser, sequence), and publishes completed
//! profiles into the per-element `FrameQueue` the caller registered for
//! that (camera, laser) pair. Late and incomplete drops are counted, never
//! propagated as errors, per §7.

pub mod config;
pub mod error;
pub mod reassembly;
pub mod receiver;

pub use config::ReceiverConfig;
pub use error::ReceiverError;
pub use receiver::{ProfileReceiver, ReceiverCounters};
