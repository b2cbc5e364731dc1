use std::collections::HashMap;

use pinchot_model::{PhaseElement, ScanHeadConfiguration, ScanWindow};
use pinchot_phase::ElementTiming;

/// Row-readout cost, in microseconds per unit of window vertical extent.
/// A coarse proxy (§9): the window model only exposes vertical extent, not
/// an exact sensor-row count, so the scheduler's bound scales with it
/// directly rather than through a geometry conversion this crate does not
/// own.
const ROW_COST_US_PER_UNIT: f64 = 10.0;

/// Lower bound applied when a window is unconstrained (full sensor height):
/// the camera reads out its entire frame every cycle.
const FULL_SENSOR_ROW_COST_US: u32 = 2_000;

struct HeadSnapshot {
    connected: bool,
    configuration: ScanHeadConfiguration,
    window: ScanWindow,
}

/// A point-in-time, synchronous view over every registered head's
/// connectivity/configuration/window, built once before validating or
/// scheduling a phase table. `pinchot_phase::ElementTiming` is a plain
/// (non-async) trait, and `ScanHead`'s getters are async, so the
/// orchestrator awaits them all up front instead of making this type
/// reach back into a lock from inside a sync trait method.
pub struct TimingSnapshot {
    heads: HashMap<u32, HeadSnapshot>,
}

impl TimingSnapshot {
    pub fn new() -> Self {
        Self {
            heads: HashMap::new(),
        }
    }

    pub fn insert(
        &mut self,
        head_id: u32,
        connected: bool,
        configuration: ScanHeadConfiguration,
        window: ScanWindow,
    ) {
        self.heads.insert(
            head_id,
            HeadSnapshot {
                connected,
                configuration,
                window,
            },
        );
    }
}

impl ElementTiming for TimingSnapshot {
    fn is_head_connected(&self, head_id: u32) -> bool {
        self.heads.get(&head_id).map(|h| h.connected).unwrap_or(false)
    }

    fn element_lower_bound_us(&self, element: &PhaseElement) -> Option<u32> {
        let head = self.heads.get(&element.head_id)?;
        let row_cost = window_row_cost_us(&head.window);
        Some(
            head.configuration
                .laser_on_default_us
                .saturating_add(head.configuration.camera_exposure_default_us)
                .saturating_add(row_cost),
        )
    }
}

fn window_row_cost_us(window: &ScanWindow) -> u32 {
    let extent = window.vertical_extent();
    if !extent.is_finite() {
        return FULL_SENSOR_ROW_COST_US;
    }
    (extent * ROW_COST_US_PER_UNIT).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinchot_model::ScanHeadConfiguration;

    #[test]
    fn unconnected_head_yields_no_bound() {
        let snapshot = TimingSnapshot::new();
        let element = PhaseElement::camera(1, 0);
        assert!(!snapshot.is_head_connected(1));
        assert!(snapshot.element_lower_bound_us(&element).is_none());
    }

    #[test]
    fn unconstrained_window_uses_the_full_sensor_cost() {
        let mut snapshot = TimingSnapshot::new();
        snapshot.insert(
            1,
            true,
            ScanHeadConfiguration::default(),
            ScanWindow::unconstrained(),
        );
        let element = PhaseElement::camera(1, 0);
        let bound = snapshot.element_lower_bound_us(&element).unwrap();
        let cfg = ScanHeadConfiguration::default();
        assert_eq!(
            bound,
            cfg.laser_on_default_us + cfg.camera_exposure_default_us + FULL_SENSOR_ROW_COST_US
        );
    }

    #[test]
    fn a_smaller_window_never_increases_the_bound() {
        let mut wide = TimingSnapshot::new();
        wide.insert(
            1,
            true,
            ScanHeadConfiguration::default(),
            ScanWindow::rectangular(100.0, -100.0, -50.0, 50.0).unwrap(),
        );
        let mut narrow = TimingSnapshot::new();
        narrow.insert(
            1,
            true,
            ScanHeadConfiguration::default(),
            ScanWindow::rectangular(10.0, -10.0, -50.0, 50.0).unwrap(),
        );
        let element = PhaseElement::camera(1, 0);
        assert!(
            narrow.element_lower_bound_us(&element).unwrap()
                <= wide.element_lower_bound_us(&element).unwrap()
        );
    }
}
