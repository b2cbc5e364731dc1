use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlChannelError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("request timed out before a response arrived")]
    Timeout,

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("i/o error on control connection: {0}")]
    Io(#[source] std::io::Error),

    #[error("malformed control frame: {0}")]
    Wire(#[from] pinchot_wire::WireError),
}
