use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum QueueError {
    #[error("wait cancelled by caller")]
    Cancelled,

    #[error("queue stopped (scanning has ended)")]
    Stopped,

    #[error("wait timed out before a profile became available")]
    Timeout,
}
