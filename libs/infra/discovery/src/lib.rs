//! Broadcast/solicit discovery of scan heads and ScanSync modules on the
//! LAN (§4.2). Idempotent and side-effect free: each `discover()` call owns
//! its own socket and aggregates responses until a quiet window elapses.

pub mod error;
pub mod service;
pub mod wire;

pub use error::DiscoveryError;
pub use service::{DiscoveryService, DEFAULT_QUIET_WINDOW};
pub use wire::{DiscoveryRecord, ScanHeadDiscoveryRecord};
