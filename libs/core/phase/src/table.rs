use std::collections::HashMap;

use pinchot_model::{Phase, PhaseElementKind};

use crate::error::PhaseError;
use crate::timing::ElementTiming;

/// Ordered list of phases. Mutable while every referenced head is
/// `Disconnected`; frozen by the scan-head layer at `StartScanning`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhaseTable {
    phases: Vec<Phase>,
}

impl PhaseTable {
    pub fn new(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn element_count(&self) -> usize {
        self.phases.iter().map(|p| p.elements.len()).sum()
    }
}

/// Validates a phase table against the rules in the spec:
/// - every element must belong to a connected head;
/// - within a phase, a head must not reuse the same camera across its
///   elements (general conflict rule);
/// - a camera-driven head (one contributing `Camera` elements) must not
///   schedule more than one camera directly within a single phase;
/// - a laser-driven head must not re-use the same camera in two
///   back-to-back phases (adjacency wraps from last to first).
pub fn validate_phase_table(
    table: &PhaseTable,
    timing: &dyn ElementTiming,
) -> Result<(), PhaseError> {
    if table.phases.is_empty() {
        return Err(PhaseError::EmptyPhaseTable);
    }

    for (phase_index, phase) in table.phases.iter().enumerate() {
        let mut cameras_seen: HashMap<(u32, u8), ()> = HashMap::new();
        let mut camera_driven_heads: HashMap<u32, usize> = HashMap::new();

        for element in &phase.elements {
            if !timing.is_head_connected(element.head_id) {
                return Err(PhaseError::UnknownOrDisconnectedHead {
                    head_id: element.head_id,
                    element: *element,
                });
            }

            let camera = element.exercised_camera();
            if cameras_seen
                .insert((element.head_id, camera), ())
                .is_some()
            {
                return Err(PhaseError::DuplicateCameraInPhase {
                    phase_index,
                    head_id: element.head_id,
                    camera,
                });
            }

            if matches!(element.kind, PhaseElementKind::Camera(_)) {
                let count = camera_driven_heads.entry(element.head_id).or_insert(0);
                *count += 1;
                if *count > 1 {
                    return Err(PhaseError::MultipleCamerasOnCameraDrivenHead {
                        phase_index,
                        head_id: element.head_id,
                    });
                }
            }
        }
    }

    let phase_count = table.phases.len();
    if phase_count > 1 {
        for i in 0..phase_count {
            let j = (i + 1) % phase_count;
            check_adjacent_laser_reuse(table, i, j)?;
        }
    }

    Ok(())
}

fn check_adjacent_laser_reuse(
    table: &PhaseTable,
    first_phase: usize,
    second_phase: usize,
) -> Result<(), PhaseError> {
    let first_laser_cameras: HashMap<u32, Vec<u8>> = laser_cameras_by_head(&table.phases[first_phase]);
    let second_laser_cameras = laser_cameras_by_head(&table.phases[second_phase]);

    for (head_id, cameras) in &first_laser_cameras {
        if let Some(other_cameras) = second_laser_cameras.get(head_id) {
            for camera in cameras {
                if other_cameras.contains(camera) {
                    return Err(PhaseError::AdjacentPhaseCameraReuse {
                        head_id: *head_id,
                        camera: *camera,
                        first_phase,
                        second_phase,
                    });
                }
            }
        }
    }
    Ok(())
}

fn laser_cameras_by_head(phase: &Phase) -> HashMap<u32, Vec<u8>> {
    let mut out: HashMap<u32, Vec<u8>> = HashMap::new();
    for element in &phase.elements {
        if let PhaseElementKind::Laser(_) = element.kind {
            out.entry(element.head_id)
                .or_default()
                .push(element.exercised_camera());
        }
    }
    out
}
