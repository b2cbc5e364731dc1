use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("failed to bind profile receiver socket: {0}")]
    Bind(#[source] std::io::Error),

    #[error("socket i/o error: {0}")]
    Io(#[source] std::io::Error),
}
