use thiserror::Error;

/// Errors that can arise from constructing or validating model values, as
/// opposed to errors from the network or the state machine layered on top.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ModelError {
    #[error("window vertices must describe a simple (non-self-intersecting) polygon")]
    SelfIntersectingWindow,

    #[error("rectangular window requires top > bottom and right > left")]
    DegenerateRectangle,

    #[error("configuration bound violated: {field} min ({min}) must be <= default ({default}) <= max ({max})")]
    ConfigurationBounds {
        field: &'static str,
        min: u32,
        default: u32,
        max: u32,
    },
}
