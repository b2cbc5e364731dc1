use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Optics and detection settings for one scan head. All time values are in
/// microseconds, matching the wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanHeadConfiguration {
    pub laser_on_min_us: u32,
    pub laser_on_default_us: u32,
    pub laser_on_max_us: u32,
    pub camera_exposure_min_us: u32,
    pub camera_exposure_default_us: u32,
    pub camera_exposure_max_us: u32,
    pub detection_threshold: u32,
    pub saturation_threshold: u32,
    pub saturated_percentage_limit: u8,
    pub scan_phase_offset_us: u32,
}

impl ScanHeadConfiguration {
    /// Validates the min <= default <= max invariant for both bounded
    /// fields. Capability bounds (the head's own hardware limits) are
    /// enforced by the control channel against `GetCapabilities`, since
    /// those limits vary per head and are not known to this crate.
    pub fn validate(&self) -> Result<(), ModelError> {
        check_bounds(
            "laser_on",
            self.laser_on_min_us,
            self.laser_on_default_us,
            self.laser_on_max_us,
        )?;
        check_bounds(
            "camera_exposure",
            self.camera_exposure_min_us,
            self.camera_exposure_default_us,
            self.camera_exposure_max_us,
        )?;
        Ok(())
    }
}

fn check_bounds(field: &'static str, min: u32, default: u32, max: u32) -> Result<(), ModelError> {
    if min <= default && default <= max {
        Ok(())
    } else {
        Err(ModelError::ConfigurationBounds {
            field,
            min,
            default,
            max,
        })
    }
}

impl Default for ScanHeadConfiguration {
    fn default() -> Self {
        Self {
            laser_on_min_us: 100,
            laser_on_default_us: 100,
            laser_on_max_us: 1_000,
            camera_exposure_min_us: 100,
            camera_exposure_default_us: 500,
            camera_exposure_max_us: 5_000,
            detection_threshold: 120,
            saturation_threshold: 1_023,
            saturated_percentage_limit: 30,
            scan_phase_offset_us: 0,
        }
    }
}

bitflags! {
    /// Which local changes have not yet been pushed to the head. Cleared
    /// only by a successful upload, drained atomically before
    /// `StartScanning` proceeds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DirtyFlags: u8 {
        const WINDOW = 0b0001;
        const CONFIGURATION = 0b0010;
        const EXCLUSION_MASK = 0b0100;
        const BRIGHTNESS_CORRECTION = 0b1000;
    }
}

/// Symbolic name for one dirty-flag bit, used where callers want to reason
/// about a single facet rather than the whole bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyFlag {
    Window,
    Configuration,
    ExclusionMask,
    BrightnessCorrection,
}

impl DirtyFlag {
    const ALL: [DirtyFlag; 4] = [
        DirtyFlag::Window,
        DirtyFlag::Configuration,
        DirtyFlag::ExclusionMask,
        DirtyFlag::BrightnessCorrection,
    ];

    fn bits(self) -> DirtyFlags {
        match self {
            DirtyFlag::Window => DirtyFlags::WINDOW,
            DirtyFlag::Configuration => DirtyFlags::CONFIGURATION,
            DirtyFlag::ExclusionMask => DirtyFlags::EXCLUSION_MASK,
            DirtyFlag::BrightnessCorrection => DirtyFlags::BRIGHTNESS_CORRECTION,
        }
    }
}

/// Explicit bit-enumeration helper: returns the flags currently set, in
/// defined low-to-high order. Callers must not rely on reflection or the
/// bitset's internal representation.
pub fn set_flags(flags: DirtyFlags) -> Vec<DirtyFlag> {
    DirtyFlag::ALL
        .into_iter()
        .filter(|flag| flags.contains(flag.bits()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_internally_consistent() {
        assert!(ScanHeadConfiguration::default().validate().is_ok());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut cfg = ScanHeadConfiguration::default();
        cfg.laser_on_default_us = cfg.laser_on_min_us - 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn set_flags_enumerates_in_low_to_high_order() {
        let flags = DirtyFlags::BRIGHTNESS_CORRECTION | DirtyFlags::WINDOW;
        assert_eq!(
            set_flags(flags),
            vec![DirtyFlag::Window, DirtyFlag::BrightnessCorrection]
        );
    }

    #[test]
    fn clearing_removes_only_the_named_bit() {
        let mut flags = DirtyFlags::all();
        flags.remove(DirtyFlags::WINDOW);
        assert!(!flags.contains(DirtyFlags::WINDOW));
        assert!(flags.contains(DirtyFlags::CONFIGURATION));
    }
}
