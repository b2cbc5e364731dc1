use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{instrument, warn};

use crate::error::DiscoveryError;
use crate::wire::{decode_response, encode_probe, DiscoveryRecord};

/// Default quiet window (§4.2): discovery keeps listening as long as new
/// responders keep showing up, and concludes once this much time has
/// passed with nothing new.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(500);

const MAX_DATAGRAM_BYTES: usize = 512;

/// Broadcast/solicit discovery of scan heads and ScanSync modules on the
/// LAN. Side-effect free: each call binds its own ephemeral socket and
/// leaves no state behind once it returns.
pub struct DiscoveryService {
    broadcast_addr: SocketAddr,
    bind_addr: SocketAddr,
    quiet_window: Duration,
}

impl DiscoveryService {
    pub fn new(broadcast_addr: SocketAddr, bind_addr: SocketAddr) -> Self {
        Self {
            broadcast_addr,
            bind_addr,
            quiet_window: DEFAULT_QUIET_WINDOW,
        }
    }

    pub fn with_quiet_window(mut self, quiet_window: Duration) -> Self {
        self.quiet_window = quiet_window;
        self
    }

    /// Sends one broadcast solicitation and aggregates responses until the
    /// quiet window elapses with no new responder. Distinct records are
    /// deduplicated by serial; running this twice against an unchanged
    /// topology yields the same set (§8 round-trip property).
    #[instrument(skip(self))]
    pub async fn discover(&self) -> Result<Vec<DiscoveryRecord>, DiscoveryError> {
        let socket = UdpSocket::bind(self.bind_addr)
            .await
            .map_err(DiscoveryError::Bind)?;
        socket.set_broadcast(true).map_err(DiscoveryError::Bind)?;

        let probe = encode_probe();
        socket
            .send_to(&probe, self.broadcast_addr)
            .await
            .map_err(DiscoveryError::Send)?;

        let mut by_serial: HashMap<u32, DiscoveryRecord> = HashMap::new();
        let mut buf = [0u8; MAX_DATAGRAM_BYTES];
        let mut deadline = Instant::now() + self.quiet_window;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
                Err(_) => break, // quiet window elapsed
                Ok(Err(io_error)) => return Err(DiscoveryError::Receive(io_error)),
                Ok(Ok((len, _from))) => {
                    match decode_response(&buf[..len]) {
                        Ok(record) => {
                            by_serial.insert(record.serial(), record);
                            deadline = Instant::now() + self.quiet_window;
                        }
                        Err(error) => warn!(%error, "ignoring malformed discovery response"),
                    }
                }
            }
        }

        Ok(by_serial.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{encode_scan_head_response, encode_scan_sync_response, ScanHeadDiscoveryRecord};
    use pinchot_model::{EncoderFlags, FirmwareVersion, ProductType, ScanSyncRecord};
    use std::net::Ipv4Addr;

    /// Exercises the service against loopback responders instead of a real
    /// broadcast segment (broadcast sockets are awkward inside a test
    /// sandbox); the quiet-window aggregation logic under test is the same
    /// either way since the service only cares about received datagrams.
    #[tokio::test]
    async fn aggregates_distinct_responders_and_dedupes_by_serial() {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let listener_addr = listener.local_addr().unwrap();

        let service = DiscoveryService::new(listener_addr, "127.0.0.1:0".parse().unwrap())
            .with_quiet_window(Duration::from_millis(100));

        let responder = tokio::spawn(async move {
            let mut probe_buf = [0u8; 64];
            let (_len, solicitor) = listener.recv_from(&mut probe_buf).await.unwrap();

            let head = encode_scan_head_response(&ScanHeadDiscoveryRecord {
                serial: 1001,
                product_type: ProductType::Js50Wx,
                firmware_version: FirmwareVersion::new(16, 0, 0),
                ip: Ipv4Addr::new(192, 168, 1, 10),
            });
            listener.send_to(&head, solicitor).await.unwrap();

            // A second response for the same serial should not duplicate.
            listener.send_to(&head, solicitor).await.unwrap();

            let sync = encode_scan_sync_response(&ScanSyncRecord {
                serial: 5,
                firmware_version: None,
                ip: None,
                flags: EncoderFlags::empty(),
            });
            listener.send_to(&sync, solicitor).await.unwrap();
        });

        let records = service.discover().await.unwrap();
        responder.await.unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.serial() == 1001));
        assert!(records.iter().any(|r| r.serial() == 5));
    }

    #[tokio::test]
    async fn discovery_with_no_responders_returns_empty_after_quiet_window() {
        let service = DiscoveryService::new(
            "127.0.0.1:59999".parse().unwrap(),
            "127.0.0.1:0".parse().unwrap(),
        )
        .with_quiet_window(Duration::from_millis(50));

        let records = service.discover().await.unwrap();
        assert!(records.is_empty());
    }
}
