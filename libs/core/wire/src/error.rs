use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("packet too short: need at least {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("packet is not a profile packet (unrecognised magic byte {0:#x})")]
    NotAProfilePacket(u8),

    #[error("declared payload length {declared} does not match actual length {actual}")]
    PayloadLengthMismatch { declared: usize, actual: usize },

    #[error("unrecognised control message kind {0}")]
    UnknownControlKind(u8),

    #[error("control frame body could not be decoded: {0}")]
    ControlBodyDecode(#[from] serde_json::Error),

    #[error("control frame declared length {declared} exceeds the maximum {max}")]
    ControlFrameTooLarge { declared: usize, max: usize },
}
