use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tracing::{instrument, trace, warn};

use pinchot_queue::{sequence_less_than, CancellationToken, FrameQueue};
use pinchot_wire::{decode_profile_fragment, WireError};

use crate::config::ReceiverConfig;
use crate::error::ReceiverError;
use crate::reassembly::ReassemblySlot;

const MAX_DATAGRAM_BYTES: usize = 65_536;

/// Counters exposed alongside a head's control-channel status (§7): late
/// and incomplete drops are never surfaced as errors, only counted.
#[derive(Debug, Default)]
pub struct ReceiverCounters {
    pub late_drop_count: AtomicU64,
    pub incomplete_drop_count: AtomicU64,
    pub profiles_published_count: AtomicU64,
}

impl ReceiverCounters {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.late_drop_count.load(Ordering::Relaxed),
            self.incomplete_drop_count.load(Ordering::Relaxed),
            self.profiles_published_count.load(Ordering::Relaxed),
        )
    }
}

/// Owns the UDP socket for one scan head, reassembles fragmented profile
/// packets, and publishes decoded profiles into the per-element queue
/// matching each packet's (camera, laser) pair (§4.4).
///
/// Runs as an independent task (`run`) that blocks only on the socket and
/// a sweep timer; it never blocks on a full queue. `FrameQueue::enqueue`
/// already evicts the oldest entry and latches `OverflowedSticky` in that
/// case, so the receiver just calls it.
pub struct ProfileReceiver {
    head_id: u32,
    socket: UdpSocket,
    element_queues: HashMap<(u8, u8), Arc<FrameQueue>>,
    config: ReceiverConfig,
    counters: ReceiverCounters,
}

impl ProfileReceiver {
    pub async fn bind(
        head_id: u32,
        bind_addr: SocketAddr,
        element_queues: HashMap<(u8, u8), Arc<FrameQueue>>,
        config: ReceiverConfig,
    ) -> Result<Self, ReceiverError> {
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(ReceiverError::Bind)?;
        Ok(Self {
            head_id,
            socket,
            element_queues,
            config,
            counters: ReceiverCounters::default(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ReceiverError> {
        self.socket.local_addr().map_err(ReceiverError::Io)
    }

    pub fn counters(&self) -> &ReceiverCounters {
        &self.counters
    }

    /// Runs until `cancel` is triggered or the socket errors fatally.
    /// Reassembly slots are swept for staleness on `config.sweep_interval`
    /// regardless of datagram traffic, so an element that simply stops
    /// sending still has its dangling partial profile evicted.
    #[instrument(skip(self, cancel), fields(head_id = self.head_id))]
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ReceiverError> {
        let mut pending: HashMap<(u8, u8, u32), ReassemblySlot> = HashMap::new();
        let mut cursor: HashMap<(u8, u8), u32> = HashMap::new();
        let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
        let mut sweep = tokio::time::interval(self.config.sweep_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = sweep.tick() => {
                    self.sweep_stale_slots(&mut pending);
                }
                received = self.socket.recv_from(&mut buf) => {
                    let (len, _from) = received.map_err(ReceiverError::Io)?;
                    self.handle_datagram(&buf[..len], &mut pending, &mut cursor);
                }
            }
        }
    }

    fn handle_datagram(
        &self,
        bytes: &[u8],
        pending: &mut HashMap<(u8, u8, u32), ReassemblySlot>,
        cursor: &mut HashMap<(u8, u8), u32>,
    ) {
        let (header, payload) = match decode_profile_fragment(bytes) {
            Ok(parsed) => parsed,
            Err(WireError::NotAProfilePacket(_)) => return,
            Err(error) => {
                trace!(%error, "dropping malformed profile fragment");
                return;
            }
        };

        let element = (header.camera, header.laser);
        let sequence = header.sequence;

        if let Some(&current) = cursor.get(&element) {
            if sequence_less_than(sequence, current) {
                let age = current.wrapping_sub(sequence);
                if age > self.config.late_drop_window {
                    self.counters.late_drop_count.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        }

        let key = (header.camera, header.laser, sequence);
        let slot = pending
            .entry(key)
            .or_insert_with(|| ReassemblySlot::new(header.clone(), Instant::now()));

        if slot.insert_fragment(header.fragment_index, payload.bytes) {
            let slot = pending.remove(&key).expect("just inserted above");
            match slot.decode() {
                Ok(profile) => {
                    if let Some(queue) = self.element_queues.get(&element) {
                        queue.enqueue(profile);
                        self.counters
                            .profiles_published_count
                            .fetch_add(1, Ordering::Relaxed);
                    } else {
                        warn!(?element, "no queue registered for this element; dropping");
                    }
                    let advance = cursor
                        .get(&element)
                        .map(|&current| sequence_less_than(current, sequence))
                        .unwrap_or(true);
                    if advance {
                        cursor.insert(element, sequence);
                    }
                }
                Err(error) => {
                    warn!(%error, "failed to decode a reassembled profile");
                    self.counters
                        .incomplete_drop_count
                        .fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn sweep_stale_slots(&self, pending: &mut HashMap<(u8, u8, u32), ReassemblySlot>) {
        let now = Instant::now();
        let timeout = self.config.assembly_timeout;
        let before = pending.len();
        pending.retain(|_, slot| slot.age(now) <= timeout);
        let evicted = before - pending.len();
        if evicted > 0 {
            self.counters
                .incomplete_drop_count
                .fetch_add(evicted as u64, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinchot_model::{DataType, PacketFlags};
    use pinchot_wire::{encode_profile_fragment, ProfilePacketHeader};
    use std::time::Duration;

    fn header(sequence: u32, fragment_index: u16, fragment_count: u16) -> ProfilePacketHeader {
        ProfilePacketHeader {
            head_serial: 1001,
            camera: 0,
            laser: 0,
            sequence,
            timestamp_ns: 0,
            data_types: DataType::XY,
            flags: PacketFlags::empty(),
            fragment_index,
            fragment_count,
            encoder_values: vec![],
            payload_len: 0,
        }
    }

    fn xy_bytes(x: i16, y: i16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&x.to_be_bytes());
        out.extend_from_slice(&y.to_be_bytes());
        out
    }

    async fn receiver_with_queue() -> (ProfileReceiver, Arc<FrameQueue>) {
        let queue = Arc::new(FrameQueue::new(16));
        let mut queues = HashMap::new();
        queues.insert((0u8, 0u8), queue.clone());
        let receiver = ProfileReceiver::bind(
            1001,
            "127.0.0.1:0".parse().unwrap(),
            queues,
            ReceiverConfig::default(),
        )
        .await
        .unwrap();
        (receiver, queue)
    }

    #[tokio::test]
    async fn single_fragment_profile_is_decoded_and_enqueued() {
        let (receiver, queue) = receiver_with_queue().await;
        let mut pending = HashMap::new();
        let mut cursor = HashMap::new();

        let datagram = encode_profile_fragment(header(1, 0, 1), &xy_bytes(10, -10));
        receiver.handle_datagram(&datagram, &mut pending, &mut cursor);

        let profile = queue.try_dequeue().unwrap();
        assert_eq!(profile.sequence, 1);
        assert_eq!(profile.points[0].x, 10.0);
        assert_eq!(receiver.counters().snapshot().2, 1);
    }

    #[tokio::test]
    async fn out_of_order_fragments_still_reassemble_correctly() {
        let (receiver, queue) = receiver_with_queue().await;
        let mut pending = HashMap::new();
        let mut cursor = HashMap::new();

        let second = encode_profile_fragment(header(1, 1, 2), &xy_bytes(2, 2));
        let first = encode_profile_fragment(header(1, 0, 2), &xy_bytes(1, 1));

        receiver.handle_datagram(&second, &mut pending, &mut cursor);
        assert!(queue.try_dequeue().is_none(), "not complete yet");
        receiver.handle_datagram(&first, &mut pending, &mut cursor);

        let profile = queue.try_dequeue().unwrap();
        assert_eq!(profile.points.len(), 2);
        assert_eq!(profile.points[0].x, 1.0);
        assert_eq!(profile.points[1].x, 2.0);
    }

    #[tokio::test]
    async fn sequence_far_behind_the_cursor_is_dropped_as_late() {
        let (receiver, queue) = receiver_with_queue().await;
        let mut pending = HashMap::new();
        let mut cursor = HashMap::new();

        let recent = encode_profile_fragment(header(1000, 0, 1), &xy_bytes(0, 0));
        receiver.handle_datagram(&recent, &mut pending, &mut cursor);
        let _ = queue.try_dequeue();

        let stale = encode_profile_fragment(header(1, 0, 1), &xy_bytes(0, 0));
        receiver.handle_datagram(&stale, &mut pending, &mut cursor);

        assert!(queue.try_dequeue().is_none());
        assert_eq!(receiver.counters().snapshot().0, 1);
    }

    #[tokio::test]
    async fn stale_partial_profile_is_swept_and_counted_incomplete() {
        let (receiver, _queue) = receiver_with_queue().await;
        let mut pending = HashMap::new();
        let mut cursor = HashMap::new();

        let only_fragment = encode_profile_fragment(header(1, 0, 2), &xy_bytes(0, 0));
        receiver.handle_datagram(&only_fragment, &mut pending, &mut cursor);
        assert_eq!(pending.len(), 1);

        tokio::time::pause();
        tokio::time::advance(Duration::from_millis(300)).await;
        receiver.sweep_stale_slots(&mut pending);

        assert!(pending.is_empty());
        assert_eq!(receiver.counters().snapshot().1, 1);
    }
}
