use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use pinchot_model::Profile;

use crate::cancellation::CancellationToken;
use crate::error::QueueError;

/// Point-in-time stats for one element's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub first_sequence: Option<u32>,
    pub last_sequence: Option<u32>,
    pub count: usize,
    pub overflowed_sticky: bool,
}

struct Inner {
    items: VecDeque<Profile>,
    overflowed_sticky: bool,
}

/// Bounded FIFO of `Profile` for one (head, camera, laser) element.
/// Single-producer (the profile receiver) / single-consumer (the caller,
/// directly or via a `FrameAssembler`).
///
/// `enqueue` never blocks: once `capacity` is reached, the oldest entry is
/// overwritten and `overflowed_sticky` latches `true` until `clear()`.
pub struct FrameQueue {
    capacity: usize,
    inner: Mutex<Inner>,
    notify: Notify,
    stopped: AtomicBool,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "FrameQueue capacity must be at least 1");
        Self {
            capacity,
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                overflowed_sticky: false,
            }),
            notify: Notify::new(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueues `profile`. Returns `true` if an older profile was
    /// overwritten to make room.
    pub fn enqueue(&self, profile: Profile) -> bool {
        let overwrote = {
            let mut inner = self.inner.lock().unwrap();
            let overwrote = inner.items.len() >= self.capacity;
            if overwrote {
                inner.items.pop_front();
                inner.overflowed_sticky = true;
            }
            inner.items.push_back(profile);
            overwrote
        };
        self.notify.notify_waiters();
        overwrote
    }

    pub fn try_dequeue(&self) -> Option<Profile> {
        self.inner.lock().unwrap().items.pop_front()
    }

    pub fn peek(&self) -> Option<Profile> {
        self.inner.lock().unwrap().items.front().cloned()
    }

    /// Blocks until a profile is available, `timeout` elapses, or `cancel`
    /// is cancelled, whichever happens first.
    pub async fn dequeue(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Profile, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Registering interest before re-checking the condition avoids
            // the missed-wakeup race: `Notify::notified()` records this
            // waiter at creation time, so an `enqueue` that races with this
            // call is still observed.
            let notified = self.notify.notified();

            if let Some(profile) = self.try_dequeue() {
                return Ok(profile);
            }
            if self.stopped.load(Ordering::Acquire) {
                return Err(QueueError::Stopped);
            }
            if cancel.is_cancelled() {
                return Err(QueueError::Cancelled);
            }

            tokio::select! {
                _ = notified => continue,
                _ = cancel.cancelled() => return Err(QueueError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => return Err(QueueError::Timeout),
            }
        }
    }

    /// Resolves the next time `enqueue` is called. Used by the frame
    /// assembler to wait across several queues at once without busy-polling.
    pub fn notified(&self) -> impl std::future::Future<Output = ()> + '_ {
        self.notify.notified()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.items.clear();
        inner.overflowed_sticky = false;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().unwrap();
        QueueStats {
            first_sequence: inner.items.front().map(|p| p.sequence),
            last_sequence: inner.items.back().map(|p| p.sequence),
            count: inner.items.len(),
            overflowed_sticky: inner.overflowed_sticky,
        }
    }

    /// Wakes every task currently blocked in `dequeue`, handing them
    /// `Stopped` rather than letting them time out. Used by `StopScanning`.
    pub fn wake_all_with_stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinchot_model::{DataType, PacketFlags};
    use std::time::Duration;

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

    #[test]
    fn capacity_one_overwrites_and_latches_overflow() {
        let queue = FrameQueue::new(1);
        assert!(!queue.enqueue(profile(1)));
        assert!(queue.enqueue(profile(2)));

        let stats = queue.stats();
        assert_eq!(stats.count, 1);
        assert!(stats.overflowed_sticky);
        assert_eq!(queue.try_dequeue().unwrap().sequence, 2);
    }

    #[test]
    fn overflow_flag_only_clears_on_explicit_clear() {
        let queue = FrameQueue::new(2);
        queue.enqueue(profile(1));
        queue.enqueue(profile(2));
        queue.enqueue(profile(3)); // overflow
        assert!(queue.stats().overflowed_sticky);

        let _ = queue.try_dequeue();
        assert!(
            queue.stats().overflowed_sticky,
            "sticky flag must survive a plain dequeue"
        );

        queue.clear();
        assert!(!queue.stats().overflowed_sticky);
        assert_eq!(queue.stats().count, 0);
    }

    #[test]
    fn fifo_ordering_is_preserved() {
        let queue = FrameQueue::new(4);
        for seq in 1..=3 {
            queue.enqueue(profile(seq));
        }
        assert_eq!(queue.try_dequeue().unwrap().sequence, 1);
        assert_eq!(queue.try_dequeue().unwrap().sequence, 2);
        assert_eq!(queue.try_dequeue().unwrap().sequence, 3);
        assert!(queue.try_dequeue().is_none());
    }

    #[tokio::test]
    async fn dequeue_times_out_when_nothing_is_enqueued() {
        let queue = FrameQueue::new(1);
        let cancel = CancellationToken::new();
        let result = queue.dequeue(Duration::from_millis(20), &cancel).await;
        assert_eq!(result, Err(QueueError::Timeout));
    }

    #[tokio::test]
    async fn dequeue_wakes_up_as_soon_as_an_item_is_enqueued() {
        let queue = std::sync::Arc::new(FrameQueue::new(1));
        let cancel = CancellationToken::new();

        let waiter_queue = queue.clone();
        let waiter_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            waiter_queue
                .dequeue(Duration::from_secs(5), &waiter_cancel)
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue(profile(7));

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task should finish")
            .unwrap();
        assert_eq!(result.unwrap().sequence, 7);
    }

    #[tokio::test]
    async fn wake_all_with_stop_hands_blocked_waiters_stopped() {
        let queue = std::sync::Arc::new(FrameQueue::new(1));
        let cancel = CancellationToken::new();

        let waiter_queue = queue.clone();
        let waiter_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            waiter_queue
                .dequeue(Duration::from_secs(5), &waiter_cancel)
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.wake_all_with_stop();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task should finish promptly once stopped")
            .unwrap();
        assert_eq!(result, Err(QueueError::Stopped));
    }

    #[tokio::test]
    async fn dequeue_returns_cancelled_promptly() {
        let queue = std::sync::Arc::new(FrameQueue::new(1));
        let cancel = CancellationToken::new();

        let waiter_queue = queue.clone();
        let waiter_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            waiter_queue
                .dequeue(Duration::from_secs(5), &waiter_cancel)
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task should finish promptly once cancelled")
            .unwrap();
        assert_eq!(result, Err(QueueError::Cancelled));
    }
}
