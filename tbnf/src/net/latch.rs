//! Countdown Latch: the counting signal the send loop waits on when its queue is empty (§5).
//!
//! `increment`/`decrement` update an atomic count; a waiter blocks until the count is above
//! zero or a timeout elapses. The count does **not** clamp at zero — the spec calls this out
//! explicitly as a hazard that must be prevented by the caller's peek/send/dequeue discipline
//! (never decrement without a matching successful dequeue). See [`super::queue::MessageQueue`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

pub struct CountdownLatch {
    count: AtomicUsize,
    notify: Notify,
}

impl CountdownLatch {
    pub fn new() -> CountdownLatch {
        CountdownLatch {
            count: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    #[inline]
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Decrements the count. Must only be called after a matching successful dequeue —
    /// over-decrementing underflows the atomic counter (§5, known hazard, not guarded here).
    #[inline]
    pub fn decrement(&self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Waits up to `timeout` for the count to become nonzero. Returns `true` if signalled,
    /// `false` on timeout.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.count.load(Ordering::SeqCst) > 0 {
            return true;
        }
        if timeout.is_zero() {
            return false;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if self.count.load(Ordering::SeqCst) > 0 {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            if tokio::time::timeout(deadline - now, notified).await.is_err() {
                return false;
            }
            // Woke up: re-check the count, since `Notify` wakeups can be spurious relative
            // to the exact condition we care about.
        }
    }
}

impl Default for CountdownLatch {
    fn default() -> CountdownLatch {
        CountdownLatch::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn times_out_when_never_signalled() {
        let latch = CountdownLatch::new();
        assert!(!latch.wait_timeout(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn wakes_immediately_when_already_signalled() {
        let latch = CountdownLatch::new();
        latch.increment();
        assert!(latch.wait_timeout(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn wakes_on_increment_from_another_task() {
        let latch = Arc::new(CountdownLatch::new());
        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move { latch.wait_timeout(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        latch.increment();

        assert!(waiter.await.unwrap());
    }
}
