use serde::{Deserialize, Serialize};

/// Whether a phase element fires a camera or a laser. Laser-driven and
/// camera-driven heads are scheduled under different adjacency rules (see
/// `pinchot-phase`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseElementKind {
    Camera(u8),
    Laser(u8),
}

/// One (head, camera-or-laser) pair scheduled into a phase slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseElement {
    pub head_id: u32,
    pub kind: PhaseElementKind,
}

impl PhaseElement {
    pub fn camera(head_id: u32, camera: u8) -> Self {
        Self {
            head_id,
            kind: PhaseElementKind::Camera(camera),
        }
    }

    pub fn laser(head_id: u32, laser: u8) -> Self {
        Self {
            head_id,
            kind: PhaseElementKind::Laser(laser),
        }
    }

    /// The camera index this element ultimately exercises: its own, for a
    /// camera element, or the camera a laser-driven head's laser is paired
    /// with. Laser-to-camera pairing is 1:1 by index in this model.
    pub fn exercised_camera(&self) -> u8 {
        match self.kind {
            PhaseElementKind::Camera(camera) => camera,
            PhaseElementKind::Laser(laser) => laser,
        }
    }
}

/// A set of elements that fire together within one time slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub elements: Vec<PhaseElement>,
}

impl Phase {
    pub fn new(elements: Vec<PhaseElement>) -> Self {
        Self { elements }
    }
}
