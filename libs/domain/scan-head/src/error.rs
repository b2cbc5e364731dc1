use thiserror::Error;

use pinchot_phase::PhaseError;
use pinchot_queue::QueueError;

use crate::state::ScanHeadState;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ScanHeadError {
    #[error("operation not valid in state {current:?}")]
    InvalidState { current: ScanHeadState },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("head is not connected")]
    NotConnected,

    #[error("operation timed out")]
    Timeout,

    #[error("scanning was stopped")]
    Stopped,

    #[error("wait was cancelled")]
    Cancelled,

    #[error("phase table rejected: {0}")]
    Phase(#[from] PhaseError),

    #[error("control channel error: {0}")]
    Transport(String),
}

impl From<QueueError> for ScanHeadError {
    fn from(value: QueueError) -> Self {
        match value {
            QueueError::Cancelled => ScanHeadError::Cancelled,
            QueueError::Stopped => ScanHeadError::Stopped,
            QueueError::Timeout => ScanHeadError::Timeout,
        }
    }
}
