use thiserror::Error;

use pinchot_model::PhaseElement;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PhaseError {
    #[error("element {element:?} references head {head_id} which is not connected")]
    UnknownOrDisconnectedHead { head_id: u32, element: PhaseElement },

    #[error("phase {phase_index} schedules head {head_id} on camera {camera} more than once")]
    DuplicateCameraInPhase {
        phase_index: usize,
        head_id: u32,
        camera: u8,
    },

    #[error(
        "phase {phase_index} schedules more than one camera directly on camera-driven head {head_id}"
    )]
    MultipleCamerasOnCameraDrivenHead { phase_index: usize, head_id: u32 },

    #[error(
        "head {head_id} reuses camera {camera} in back-to-back phases {first_phase} and {second_phase}"
    )]
    AdjacentPhaseCameraReuse {
        head_id: u32,
        camera: u8,
        first_phase: usize,
        second_phase: usize,
    },

    #[error("phase table has no phases")]
    EmptyPhaseTable,
}
