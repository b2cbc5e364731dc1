//! Domain data model shared by every layer of the scan system.
//!
//! This crate holds plain data: no sockets, no state machines, no async. It
//! exists so the wire codec, the queues, the phase scheduler, and the
//! orchestrator can all agree on one vocabulary for scan heads, windows,
//! profiles, and frames without depending on each other.

pub mod config;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod phase;
pub mod product;
pub mod profile;
pub mod units;
pub mod window;

pub use config::{DirtyFlag, DirtyFlags, ScanHeadConfiguration};
pub use encoder::{EncoderFlags, ScanSyncRecord};
pub use error::ModelError;
pub use frame::Frame;
pub use phase::{Phase, PhaseElement, PhaseElementKind};
pub use product::{FirmwareVersion, ProductType};
pub use profile::{DataType, PacketFlags, Profile, ProfilePoint};
pub use units::Units;
pub use window::{Point2D, ScanWindow, WindowKind};
