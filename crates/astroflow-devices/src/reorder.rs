/*!
 * Reordering queue for messages that arrive before their device is known.
 *
 * INDI servers may interleave a device's first vectors ahead of its
 * `DRIVER_INFO`. Such messages are parked here and handled again once the
 * device registers, or on each retry tick. Every retry increments the
 * message's counter; a message that reaches the retry ceiling is dropped.
 */
use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::protocol::Message;

/// Default retry ceiling
pub const DEFAULT_RETRY_CEILING: u32 = 2048;

/// A queued message and the number of times it has been offered
#[derive(Debug, Clone, PartialEq)]
pub struct Pending {
    /// The message
    pub message: Message,
    /// Times offered, starting at 1
    pub attempts: u32,
}

/// FIFO of messages waiting for their device
#[derive(Debug)]
pub struct ReorderingQueue {
    entries: VecDeque<Pending>,
    ceiling: u32,
}

impl Default for ReorderingQueue {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_CEILING)
    }
}

impl ReorderingQueue {
    /// Create an empty queue with the given retry ceiling
    pub fn new(ceiling: u32) -> Self {
        Self {
            entries: VecDeque::new(),
            ceiling: ceiling.max(1),
        }
    }

    /// Retry ceiling
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Queue a message seen for the first time
    pub fn offer(&mut self, message: Message) {
        trace!(device = %message.device(), vector = ?message.vector_name(), "Queueing message for unknown device");
        self.entries.push_back(Pending { message, attempts: 1 });
    }

    /// Queue a message again after a failed retry. Returns `false` if the
    /// message hit the retry ceiling and was dropped.
    pub fn requeue(&mut self, mut pending: Pending) -> bool {
        if pending.attempts >= self.ceiling {
            warn!(
                device = %pending.message.device(),
                vector = ?pending.message.vector_name(),
                attempts = pending.attempts,
                "message looping detected"
            );
            return false;
        }
        pending.attempts += 1;
        self.entries.push_back(pending);
        true
    }

    /// Remove and return every entry, oldest first
    pub fn take_all(&mut self) -> VecDeque<Pending> {
        std::mem::take(&mut self.entries)
    }

    /// Remove and return the entries for `device`, oldest first. The other
    /// entries stay queued in their original order with unchanged counters.
    pub fn drain_device(&mut self, device: &str) -> Vec<Message> {
        let (matching, rest): (VecDeque<_>, VecDeque<_>) = self
            .take_all()
            .into_iter()
            .partition(|p| p.message.device() == device);
        self.entries = rest;
        matching.into_iter().map(|p| p.message).collect()
    }

    /// Drop every entry for `device`, returning how many were dropped
    pub fn purge(&mut self, device: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|p| p.message.device() != device);
        before - self.entries.len()
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.entries.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PropertyState, SetVector};

    fn set(device: &str, value: f64) -> Message {
        SetVector::number(device, "CCD_EXPOSURE", PropertyState::Busy, [("CCD_EXPOSURE_VALUE", value)]).into()
    }

    #[test]
    fn test_drain_device_keeps_order() {
        let mut queue = ReorderingQueue::default();
        queue.offer(set("A", 1.0));
        queue.offer(set("B", 2.0));
        queue.offer(set("A", 3.0));
        queue.offer(set("C", 4.0));

        let drained = queue.drain_device("A");
        assert_eq!(drained, vec![set("A", 1.0), set("A", 3.0)]);

        let rest: Vec<_> = queue.take_all().into_iter().map(|p| p.message).collect();
        assert_eq!(rest, vec![set("B", 2.0), set("C", 4.0)]);
    }

    #[test_log::test]
    fn test_requeue_drops_at_ceiling() {
        let mut queue = ReorderingQueue::new(3);
        queue.offer(set("Ghost", 1.0));

        let mut retries = 0;
        loop {
            let Some(pending) = queue.take_all().pop_front() else {
                break;
            };
            retries += 1;
            if !queue.requeue(pending) {
                break;
            }
        }

        assert_eq!(retries, 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_purge() {
        let mut queue = ReorderingQueue::default();
        queue.offer(set("A", 1.0));
        queue.offer(set("B", 2.0));
        queue.offer(set("A", 3.0));

        assert_eq!(queue.purge("A"), 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.purge("A"), 0);
    }
}
