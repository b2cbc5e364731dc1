//! Per-element bounded queues and the frame assembler built on top of them.
//!
//! A `FrameQueue` is single-producer (the profile receiver) / single-
//! consumer (the caller, directly or via the frame assembler). Enqueue
//! never blocks: a full queue overwrites its oldest entry and raises a
//! sticky overflow flag that only `clear()` resets.

pub mod cancellation;
pub mod error;
pub mod frame_assembler;
pub mod frame_queue;
pub mod sequence;

pub use cancellation::CancellationToken;
pub use error::QueueError;
pub use frame_assembler::{AssemblerStats, FrameAssembler};
pub use frame_queue::{FrameQueue, QueueStats};
pub use sequence::sequence_less_than;
