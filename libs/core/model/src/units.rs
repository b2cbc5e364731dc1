use serde::{Deserialize, Serialize};

/// Display units selected once per scan system. Geometry conversion between
/// units is a named external collaborator (see crate-level docs); this type
/// only records the caller's choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    Inches,
    Millimetres,
}

impl Default for Units {
    fn default() -> Self {
        Units::Millimetres
    }
}
