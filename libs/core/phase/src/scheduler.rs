use pinchot_model::Phase;

use crate::error::PhaseError;
use crate::timing::ElementTiming;

/// Minimum feasible scan period, in microseconds, for a phase table.
///
/// Each phase's duration is bounded below by its slowest element (the
/// phase fires its elements concurrently, then waits for all of them);
/// the scan period is the sum of phase durations plus a fixed overhead
/// per phase transition.
pub fn min_scan_period_us(
    phases: &[Phase],
    timing: &dyn ElementTiming,
    inter_phase_overhead_us: u32,
) -> Result<u32, PhaseError> {
    if phases.is_empty() {
        return Err(PhaseError::EmptyPhaseTable);
    }

    let mut total: u32 = 0;
    for phase in phases {
        let mut phase_bound: u32 = 0;
        for element in &phase.elements {
            if !timing.is_head_connected(element.head_id) {
                return Err(PhaseError::UnknownOrDisconnectedHead {
                    head_id: element.head_id,
                    element: *element,
                });
            }
            let bound = timing.element_lower_bound_us(element).ok_or(
                PhaseError::UnknownOrDisconnectedHead {
                    head_id: element.head_id,
                    element: *element,
                },
            )?;
            phase_bound = phase_bound.max(bound);
        }
        total = total.saturating_add(phase_bound).saturating_add(inter_phase_overhead_us);
    }

    Ok(total)
}
