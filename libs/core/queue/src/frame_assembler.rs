use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::instrument;

use pinchot_model::Frame;

use crate::cancellation::CancellationToken;
use crate::error::QueueError;
use crate::frame_queue::FrameQueue;
use crate::sequence::sequence_less_than;

/// Aggregate stats across every queue the assembler watches, refreshed on
/// each `try_dequeue_frame` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssemblerStats {
    pub min_queue_size: usize,
    pub max_queue_size: usize,
    pub min_head_sequence: Option<u32>,
    pub max_head_sequence: Option<u32>,
    pub any_overflowed: bool,
    /// Per the spec's open question on cursor advancement: the assembler
    /// advances `current_sequence` even when a frame is entirely null.
    /// This counter lets a caller detect a sustained outage instead of the
    /// cursor silently marching forward unnoticed.
    pub consecutive_empty_frames: u32,
}

struct StatsInner {
    any_overflowed: bool,
    consecutive_empty_frames: u32,
}

/// Aligns the heads of every active element's queue to a common,
/// monotonically advancing sequence number, producing one `Frame` per
/// scan cycle. Holds a non-owning view (shared references) of queues
/// owned by their respective scan heads.
pub struct FrameAssembler {
    queues: Vec<Arc<FrameQueue>>,
    current_sequence: AtomicU32,
    cursor_initialized: std::sync::atomic::AtomicBool,
    stats: Mutex<StatsInner>,
    frames_emitted: AtomicU64,
}

impl FrameAssembler {
    pub fn new(queues: Vec<Arc<FrameQueue>>) -> Self {
        Self {
            queues,
            current_sequence: AtomicU32::new(0),
            cursor_initialized: std::sync::atomic::AtomicBool::new(false),
            stats: Mutex::new(StatsInner {
                any_overflowed: false,
                consecutive_empty_frames: 0,
            }),
            frames_emitted: AtomicU64::new(0),
        }
    }

    pub fn element_count(&self) -> usize {
        self.queues.len()
    }

    pub fn current_sequence(&self) -> u32 {
        self.current_sequence.load(Ordering::SeqCst)
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted.load(Ordering::SeqCst)
    }

    fn ensure_cursor_initialized(&self) {
        if self.cursor_initialized.load(Ordering::SeqCst) {
            return;
        }
        let smallest_first_sequence = self
            .queues
            .iter()
            .filter_map(|queue| queue.stats().first_sequence)
            .min();
        if let Some(sequence) = smallest_first_sequence {
            self.current_sequence.store(sequence, Ordering::SeqCst);
            self.cursor_initialized.store(true, Ordering::SeqCst);
        }
        // If every queue is still empty, the cursor stays uninitialized
        // (defaulting to 0) and will be retried on the next call.
    }

    /// Never blocks. Implements the fill algorithm exactly as specified:
    /// for each element's queue, in phase-table order, either supplies the
    /// profile matching `current_sequence`, discarding anything older, or
    /// leaves a null slot without consuming data that is newer than the
    /// cursor. Advances `current_sequence` by one unconditionally,
    /// including when every slot came back null.
    #[instrument(skip(self))]
    pub fn try_dequeue_frame(&self) -> Frame {
        self.ensure_cursor_initialized();
        let sequence = self.current_sequence.load(Ordering::SeqCst);

        let mut slots = Vec::with_capacity(self.queues.len());
        let mut min_size = usize::MAX;
        let mut max_size = 0usize;
        let mut min_head = None;
        let mut max_head = None;
        let mut any_overflowed = false;
        let mut any_slot_filled = false;

        for queue in &self.queues {
            let stats = queue.stats();
            min_size = min_size.min(stats.count);
            max_size = max_size.max(stats.count);
            if let Some(head) = stats.first_sequence {
                min_head = Some(min_head.map_or(head, |m: u32| m.min(head)));
                max_head = Some(max_head.map_or(head, |m: u32| m.max(head)));
            }
            any_overflowed |= stats.overflowed_sticky;

            let mut filled = None;
            loop {
                match queue.peek() {
                    None => break,
                    Some(candidate) => {
                        if sequence_less_than(sequence, candidate.sequence) {
                            // Head is ahead of the cursor: leave it in
                            // place, this element has nothing for us yet.
                            break;
                        }
                        if candidate.sequence == sequence {
                            filled = queue.try_dequeue();
                            break;
                        }
                        // candidate.sequence < sequence: stale, discard.
                        queue.try_dequeue();
                    }
                }
            }
            any_slot_filled |= filled.is_some();
            slots.push(filled);
        }

        if self.queues.is_empty() {
            min_size = 0;
        }

        self.current_sequence
            .store(sequence.wrapping_add(1), Ordering::SeqCst);
        self.frames_emitted.fetch_add(1, Ordering::SeqCst);

        {
            let mut stats = self.stats.lock().unwrap();
            stats.any_overflowed |= any_overflowed;
            stats.consecutive_empty_frames = if any_slot_filled {
                0
            } else {
                stats.consecutive_empty_frames + 1
            };
        }

        let _ = (min_size, max_size, min_head, max_head); // surfaced via `stats()`
        Frame::new(sequence, slots)
    }

    /// Blocks until at least one watched queue has data, `timeout`
    /// elapses, or `cancel` is triggered, then performs one (possibly
    /// partial) fill pass. Does not wait for a *complete* frame: a single
    /// lagging element still yields a partial frame immediately once any
    /// other element has data, matching the non-blocking contract.
    pub async fn dequeue_frame(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Frame, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.queues.iter().any(|q| q.peek().is_some()) {
                return Ok(self.try_dequeue_frame());
            }
            if self.queues.iter().any(|q| q.is_stopped()) {
                return Err(QueueError::Stopped);
            }
            if cancel.is_cancelled() {
                return Err(QueueError::Cancelled);
            }

            let notifies: Vec<_> = self.queues.iter().map(|q| q.notified()).collect();
            tokio::select! {
                _ = futures::future::select_all(notifies) => continue,
                _ = cancel.cancelled() => return Err(QueueError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => return Err(QueueError::Timeout),
            }
        }
    }

    pub fn stats(&self) -> AssemblerStats {
        let queue_stats: Vec<_> = self.queues.iter().map(|q| q.stats()).collect();
        let min_queue_size = queue_stats.iter().map(|s| s.count).min().unwrap_or(0);
        let max_queue_size = queue_stats.iter().map(|s| s.count).max().unwrap_or(0);
        let min_head_sequence = queue_stats.iter().filter_map(|s| s.first_sequence).min();
        let max_head_sequence = queue_stats.iter().filter_map(|s| s.first_sequence).max();
        let guard = self.stats.lock().unwrap();
        AssemblerStats {
            min_queue_size,
            max_queue_size,
            min_head_sequence,
            max_head_sequence,
            any_overflowed: guard.any_overflowed,
            consecutive_empty_frames: guard.consecutive_empty_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinchot_model::{DataType, PacketFlags, Profile};

    fn profile(sequence: u32) -> Profile {
        Profile {
            head_id: 0,
            camera: 0,
            laser: 0,
            encoder_values: vec![],
            timestamp_ns: 0,
            sequence,
            flags: PacketFlags::empty(),
            data_types: DataType::XY,
            points: vec![],
            raw_camera_points: None,
        }
    }

    fn two_queue_assembler() -> (Arc<FrameQueue>, Arc<FrameQueue>, FrameAssembler) {
        let a = Arc::new(FrameQueue::new(16));
        let b = Arc::new(FrameQueue::new(16));
        let assembler = FrameAssembler::new(vec![a.clone(), b.clone()]);
        (a, b, assembler)
    }

    #[test]
    fn complete_frames_when_every_queue_keeps_pace() {
        let (a, b, assembler) = two_queue_assembler();
        for seq in 0..100 {
            a.enqueue(profile(seq));
            b.enqueue(profile(seq));
        }

        let mut complete_count = 0;
        for _ in 0..100 {
            let frame = assembler.try_dequeue_frame();
            assert_eq!(frame.count(), 2);
            if frame.is_complete() {
                complete_count += 1;
            }
        }
        assert_eq!(complete_count, 100);
        assert_eq!(assembler.frames_emitted(), 100);
    }

    #[test]
    fn lagging_queue_yields_partial_frames_and_cursor_still_advances() {
        let (a, b, assembler) = two_queue_assembler();
        // `a` only gets every other profile; `b` gets all of them.
        for seq in 0..100u32 {
            if seq % 2 == 0 {
                a.enqueue(profile(seq));
            }
            b.enqueue(profile(seq));
        }

        let mut complete = 0;
        let mut partial = 0;
        for _ in 0..100 {
            let frame = assembler.try_dequeue_frame();
            if frame.is_complete() {
                complete += 1;
            } else {
                partial += 1;
                assert!(frame.slot(0).is_none());
            }
        }
        assert_eq!(complete, 50);
        assert_eq!(partial, 50);
        assert_eq!(assembler.current_sequence(), 100);
    }

    #[test]
    fn cursor_advances_even_when_every_slot_is_null() {
        let (_a, _b, assembler) = two_queue_assembler();
        let frame = assembler.try_dequeue_frame();
        assert!(!frame.is_complete());
        assert_eq!(assembler.current_sequence(), 1);
        assert_eq!(assembler.stats().consecutive_empty_frames, 1);
    }

    #[test]
    fn stale_profiles_are_discarded_without_filling_the_slot() {
        let (a, b, assembler) = two_queue_assembler();
        a.enqueue(profile(0));
        a.enqueue(profile(1));
        b.enqueue(profile(1));

        // Cursor initializes to 0 (a's first sequence); first pass
        // consumes a's sequence 0, but b has nothing for sequence 0.
        let frame0 = assembler.try_dequeue_frame();
        assert!(!frame0.is_complete());
        assert!(frame0.slot(1).is_none());

        // Second pass: cursor is 1. `a`'s head is already 1 (matches).
        // `b`'s head is 1 too.
        let frame1 = assembler.try_dequeue_frame();
        assert!(frame1.is_complete());
        assert_eq!(frame1.slot(0).unwrap().sequence, 1);
        assert_eq!(frame1.slot(1).unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn dequeue_frame_blocks_until_data_arrives_then_returns_promptly() {
        let (a, b, assembler) = two_queue_assembler();
        let assembler = Arc::new(assembler);
        let cancel = CancellationToken::new();

        let waiter = assembler.clone();
        let waiter_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            waiter
                .dequeue_frame(Duration::from_secs(5), &waiter_cancel)
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        a.enqueue(profile(0));
        b.enqueue(profile(0));

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("should resolve quickly once data lands")
            .unwrap();
        assert!(result.unwrap().is_complete());
    }

    #[tokio::test]
    async fn dequeue_frame_returns_stopped_once_a_watched_queue_is_stopped() {
        let (a, b, assembler) = two_queue_assembler();
        let assembler = Arc::new(assembler);
        let cancel = CancellationToken::new();

        let waiter = assembler.clone();
        let waiter_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            waiter
                .dequeue_frame(Duration::from_secs(5), &waiter_cancel)
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        a.wake_all_with_stop();
        b.wake_all_with_stop();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("should resolve promptly once stopped")
            .unwrap();
        assert_eq!(result, Err(QueueError::Stopped));
    }

    #[tokio::test]
    async fn dequeue_frame_returns_cancelled_and_state_stays_usable_afterward() {
        let (a, b, assembler) = two_queue_assembler();
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        let result = assembler
            .dequeue_frame(Duration::from_secs(5), &cancel)
            .await;
        assert_eq!(result, Err(QueueError::Cancelled));

        // The assembler is untouched by a cancelled wait: a fresh,
        // uncancelled call still succeeds.
        a.enqueue(profile(0));
        b.enqueue(profile(0));
        let fresh_cancel = CancellationToken::new();
        let frame = assembler
            .dequeue_frame(Duration::from_secs(1), &fresh_cancel)
            .await
            .unwrap();
        assert!(frame.is_complete());
    }
}
