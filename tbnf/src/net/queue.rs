//! Thread-safe FIFO message queue paired with a [`CountdownLatch`] (§5).
//!
//! A queued frame survives until it is actually written to a socket: the send loop peeks the
//! head, attempts the write, and only dequeues on success (§4.4). This is what lets a queued
//! message survive a socket replacement — the peek leaves it in place for the next attempt.

use super::latch::CountdownLatch;
use crate::registry::{PackagedFrame, MAX_FRAME_SIZE};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

pub struct MessageQueue {
    frames: Mutex<VecDeque<PackagedFrame>>,
    latch: CountdownLatch,
}

impl MessageQueue {
    pub fn new() -> MessageQueue {
        MessageQueue {
            frames: Mutex::new(VecDeque::new()),
            latch: CountdownLatch::new(),
        }
    }

    /// Appends `frame`. Non-blocking, safe to call from multiple producers.
    ///
    /// Returns `false` without queuing if `frame` exceeds [`MAX_FRAME_SIZE`] (the `FrameTooLarge`
    /// case from §4.2/§7 — fatal to that send attempt, never retried since it cannot fit).
    pub fn enqueue(&self, frame: PackagedFrame) -> bool {
        if frame.len() > MAX_FRAME_SIZE {
            return false;
        }
        self.frames.lock().unwrap().push_back(frame);
        self.latch.increment();
        true
    }

    /// Returns a clone of the head frame without removing it.
    pub fn try_peek(&self) -> Option<PackagedFrame> {
        self.frames.lock().unwrap().front().cloned()
    }

    /// Removes the head frame, if any, and decrements the latch to match.
    pub fn try_dequeue(&self) -> Option<PackagedFrame> {
        let front = self.frames.lock().unwrap().pop_front();
        if front.is_some() {
            self.latch.decrement();
        }
        front
    }

    /// Waits up to `timeout` for a message to become available.
    pub async fn wait(&self, timeout: Duration) -> bool {
        self.latch.wait_timeout(timeout).await
    }
}

impl Default for MessageQueue {
    fn default() -> MessageQueue {
        MessageQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::IdentificationMessage;
    use crate::registry::{MessageDescriptor, MessageRegistry};

    #[test]
    fn peek_then_dequeue_preserves_head_on_failed_send() {
        let registry = MessageRegistry::build(Vec::new()).unwrap();
        let queue = MessageQueue::new();
        let frame = PackagedFrame::pack(&registry, &IdentificationMessage { hardware_address: [1; 6] }).unwrap();

        assert!(queue.enqueue(frame.clone()));
        // Simulated failed send: peek but do not dequeue.
        assert_eq!(queue.try_peek(), Some(frame.clone()));
        assert_eq!(queue.try_peek(), Some(frame.clone()));
        // Simulated successful send: dequeue once.
        assert_eq!(queue.try_dequeue(), Some(frame));
        assert_eq!(queue.try_peek(), None);
    }

    #[tokio::test]
    async fn oversize_frame_is_rejected_without_queuing() {
        let huge = PackagedFrame::from_wire(vec![0u8; MAX_FRAME_SIZE + 1]);
        let queue = MessageQueue::new();
        assert!(!queue.enqueue(huge));
        assert!(queue.try_peek().is_none());
        assert!(!queue.wait(Duration::from_millis(10)).await);
    }
}
