use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{instrument, warn};

use pinchot_scan_head::error::ScanHeadError;
use pinchot_scan_head::transport::ControlTransport;
use pinchot_wire::{decode_control_response, encode_control_request, ControlRequest, ControlResponse};

use crate::error::ControlChannelError;

/// One logical request/response connection to a single scan head (§4.3).
/// Concurrent callers are serialised by `connection`'s async mutex, which
/// grants its lock in FIFO order, matching the "fair FIFO" requirement for
/// concurrent callers on one head.
///
/// The connection is lazily (re)established: a fresh `TcpControlTransport`
/// holds no socket until the first `send`, and a request that hits an I/O
/// error marks the transport `Stale` and reconnects on the *next* call
/// rather than retrying inline, matching §4.3's recovery policy.
pub struct TcpControlTransport {
    addr: SocketAddr,
    connection: Mutex<Option<TcpStream>>,
    stale: AtomicBool,
}

impl TcpControlTransport {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connection: Mutex::new(None),
            stale: AtomicBool::new(true),
        }
    }

    async fn connect(&self, deadline: Instant) -> Result<TcpStream, ControlChannelError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ControlChannelError::Timeout);
        }
        tokio::time::timeout(remaining, TcpStream::connect(self.addr))
            .await
            .map_err(|_| ControlChannelError::Timeout)?
            .map_err(|source| ControlChannelError::Connect { addr: self.addr, source })
    }

    #[instrument(skip(self, request), fields(addr = %self.addr))]
    async fn send_inner(
        &self,
        request: ControlRequest,
        deadline: Instant,
    ) -> Result<ControlResponse, ControlChannelError> {
        let mut guard = self.connection.lock().await;

        if guard.is_none() {
            *guard = Some(self.connect(deadline).await?);
            self.stale.store(false, Ordering::Release);
        }
        let stream = guard.as_mut().expect("just established above");

        let result = Self::roundtrip(stream, &request, deadline).await;
        if result.is_err() {
            // Drop the connection so the next call reconnects, and mark
            // this transport stale for informational diagnostics.
            *guard = None;
            self.stale.store(true, Ordering::Release);
        }
        result
    }

    async fn roundtrip(
        stream: &mut TcpStream,
        request: &ControlRequest,
        deadline: Instant,
    ) -> Result<ControlResponse, ControlChannelError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ControlChannelError::Timeout);
        }

        tokio::time::timeout(remaining, async {
            let encoded = encode_control_request(request);
            stream.write_all(&encoded).await?;

            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).await?;
            let body_len = Cursor::new(len_buf).read_u32::<BigEndian>().unwrap() as usize;

            let mut body = vec![0u8; body_len];
            stream.read_exact(&mut body).await?;

            let mut framed = Vec::with_capacity(4 + body_len);
            framed.extend_from_slice(&len_buf);
            framed.extend_from_slice(&body);
            Ok(decode_control_response(&framed)?)
        })
        .await
        .map_err(|_| ControlChannelError::Timeout)?
    }
}

impl From<std::io::Error> for ControlChannelError {
    fn from(value: std::io::Error) -> Self {
        if value.kind() == std::io::ErrorKind::UnexpectedEof {
            ControlChannelError::ConnectionClosed
        } else {
            ControlChannelError::Io(value)
        }
    }
}

impl From<ControlChannelError> for ScanHeadError {
    fn from(value: ControlChannelError) -> Self {
        match value {
            ControlChannelError::Timeout => ScanHeadError::Timeout,
            other => ScanHeadError::Transport(other.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl ControlTransport for TcpControlTransport {
    async fn send(
        &self,
        request: ControlRequest,
        deadline: Instant,
    ) -> Result<ControlResponse, ScanHeadError> {
        self.send_inner(request, deadline).await.map_err(Into::into)
    }

    fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinchot_wire::{decode_control_request, encode_control_response, ScanHeadStatus};
    use pinchot_model::EncoderFlags;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn echo_status_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            loop {
                let mut len_buf = [0u8; 4];
                if stream.read_exact(&mut len_buf).await.is_err() {
                    return;
                }
                let body_len = Cursor::new(len_buf).read_u32::<BigEndian>().unwrap() as usize;
                let mut body = vec![0u8; body_len];
                stream.read_exact(&mut body).await.unwrap();
                let mut framed = Vec::new();
                framed.extend_from_slice(&len_buf);
                framed.extend_from_slice(&body);
                let _request = decode_control_request(&framed).unwrap();

                let response = ControlResponse::Status(ScanHeadStatus {
                    global_time_ns: 123,
                    encoder_flags: EncoderFlags::SYNC,
                    is_scanning: false,
                    late_drop_count: 0,
                    incomplete_drop_count: 0,
                    profiles_sent_count: 0,
                });
                stream.write_all(&encode_control_response(&response)).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn round_trips_a_request_over_a_fresh_connection() {
        let addr = echo_status_server().await;
        let transport = TcpControlTransport::new(addr);

        let deadline = Instant::now() + Duration::from_secs(1);
        let response = transport.send(ControlRequest::GetStatus, deadline).await.unwrap();
        match response {
            ControlResponse::Status(status) => assert_eq!(status.global_time_ns, 123),
            other => panic!("unexpected response: {other:?}"),
        }
        assert!(!transport.is_stale());
    }

    #[tokio::test]
    async fn connecting_to_nothing_times_out_rather_than_hanging() {
        // No listener on this port; connect should fail quickly rather
        // than block past the deadline.
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let transport = TcpControlTransport::new(addr);
        let deadline = Instant::now() + Duration::from_millis(200);
        let result = transport.send(ControlRequest::GetStatus, deadline).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reuses_the_connection_across_multiple_requests() {
        let addr = echo_status_server().await;
        let transport = TcpControlTransport::new(addr);
        let deadline = Instant::now() + Duration::from_secs(1);

        for _ in 0..3 {
            transport
                .send(ControlRequest::GetStatus, deadline)
                .await
                .unwrap();
        }
        assert!(!transport.is_stale());
    }
}
