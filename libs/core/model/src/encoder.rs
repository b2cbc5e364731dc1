use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::product::FirmwareVersion;

bitflags! {
    /// ScanSync status bits, bit-exact with the on-wire bitset. The spec
    /// notes two competing definitions in the source material (a small one
    /// and this extended one including `LASER_DISABLE`/`AUX_Y`); this
    /// implementation adopts the extended definition per the design note
    /// in the spec, and treats bits absent from older firmware as zero.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EncoderFlags: u32 {
        const FAULT_A            = 1 << 0;
        const FAULT_B            = 1 << 1;
        const FAULT_Y            = 1 << 2;
        const FAULT_Z            = 1 << 3;
        const OVERRUN            = 1 << 4;
        const TERMINATION_ENABLE = 1 << 5;
        const INDEX_Z            = 1 << 6;
        const SYNC               = 1 << 7;
        const AUX_Y              = 1 << 8;
        const FAULT_SYNC         = 1 << 9;
        const LASER_DISABLE      = 1 << 10;
        const FAULT_LASER_DISABLE = 1 << 11;
    }
}

impl EncoderFlags {
    /// Explicit bit-enumeration helper, low-to-high, as required by the
    /// spec's design note: implementations must not rely on
    /// language-provided reflection to iterate flag bits.
    pub fn set_bit_names(self) -> Vec<&'static str> {
        const ORDERED: [(EncoderFlags, &str); 12] = [
            (EncoderFlags::FAULT_A, "FAULT_A"),
            (EncoderFlags::FAULT_B, "FAULT_B"),
            (EncoderFlags::FAULT_Y, "FAULT_Y"),
            (EncoderFlags::FAULT_Z, "FAULT_Z"),
            (EncoderFlags::OVERRUN, "OVERRUN"),
            (EncoderFlags::TERMINATION_ENABLE, "TERMINATION_ENABLE"),
            (EncoderFlags::INDEX_Z, "INDEX_Z"),
            (EncoderFlags::SYNC, "SYNC"),
            (EncoderFlags::AUX_Y, "AUX_Y"),
            (EncoderFlags::FAULT_SYNC, "FAULT_SYNC"),
            (EncoderFlags::LASER_DISABLE, "LASER_DISABLE"),
            (EncoderFlags::FAULT_LASER_DISABLE, "FAULT_LASER_DISABLE"),
        ];
        ORDERED
            .into_iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| name)
            .collect()
    }
}

/// Snapshot refreshed by each ScanSync announcement frame. `ip` and
/// `firmware_version` are `None` for modules running firmware older than
/// 2.1.0, which omit those fields on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSyncRecord {
    pub serial: u32,
    pub firmware_version: Option<FirmwareVersion>,
    pub ip: Option<Ipv4Addr>,
    pub flags: EncoderFlags,
}

impl ScanSyncRecord {
    /// Per §4.2: firmware below 2.1.0 omits IP/version, exposing only a
    /// serial.
    pub const MIN_VERSION_WITH_IDENTITY: FirmwareVersion = FirmwareVersion::new(2, 1, 0);

    pub fn has_full_identity(&self) -> bool {
        self.firmware_version
            .map(|version| version >= Self::MIN_VERSION_WITH_IDENTITY)
            .unwrap_or(false)
    }
}
