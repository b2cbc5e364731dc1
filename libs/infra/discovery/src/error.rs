use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to bind discovery socket: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to send discovery probe: {0}")]
    Send(#[source] std::io::Error),

    #[error("failed to receive discovery response: {0}")]
    Receive(#[source] std::io::Error),

    #[error("malformed discovery response: need at least {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("unrecognised discovery response kind {0}")]
    UnknownKind(u8),

    #[error("unrecognised discovery magic byte {0:#x}")]
    BadMagic(u8),
}
