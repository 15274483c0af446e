//! Buffer for messages published while the broker is unreachable.

use crate::traits::transport::{QoS, TransportError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::time::Duration;

/// How many messages the offline queue may hold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum QueueLimit {
    #[default]
    Unbounded,
    /// Publishing while disconnected fails instead of queueing.
    Disabled,
    Bounded(NonZeroUsize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("offline queue size must be -1 (unbounded) or at least 0, got {0}")]
pub struct InvalidQueueSize(pub i64);

impl TryFrom<i64> for QueueLimit {
    type Error = InvalidQueueSize;

    fn try_from(size: i64) -> Result<Self, Self::Error> {
        match size {
            -1 => Ok(QueueLimit::Unbounded),
            0 => Ok(QueueLimit::Disabled),
            n if n > 0 => usize::try_from(n)
                .ok()
                .and_then(NonZeroUsize::new)
                .map(QueueLimit::Bounded)
                .ok_or(InvalidQueueSize(n)),
            n => Err(InvalidQueueSize(n)),
        }
    }
}

/// What to give up when a bounded queue is full.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropBehavior {
    /// Evict the oldest queued message to make room.
    #[default]
    Oldest,
    /// Reject the message being published.
    Newest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

impl OutboundMessage {
    pub fn new(topic: &str, payload: &[u8], qos: QoS) -> Self {
        Self {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
        }
    }
}

pub struct OfflineQueue {
    limit: QueueLimit,
    drop_behavior: DropBehavior,
    messages: VecDeque<OutboundMessage>,
    dropped: u64,
}

impl OfflineQueue {
    pub fn new(limit: QueueLimit, drop_behavior: DropBehavior) -> Self {
        Self {
            limit,
            drop_behavior,
            messages: VecDeque::new(),
            dropped: 0,
        }
    }

    pub fn push(&mut self, message: OutboundMessage) -> Result<(), TransportError> {
        match self.limit {
            QueueLimit::Disabled => return Err(TransportError::NotConnected),
            QueueLimit::Bounded(max) if self.messages.len() >= max.get() => {
                match self.drop_behavior {
                    DropBehavior::Oldest => {
                        self.messages.pop_front();
                        self.dropped += 1;
                        log::warn!("Offline queue full, dropped oldest message");
                    }
                    DropBehavior::Newest => {
                        self.dropped += 1;
                        return Err(TransportError::QueueFull);
                    }
                }
            }
            _ => {}
        }
        self.messages.push_back(message);
        Ok(())
    }

    /// Puts a message that could not be drained back at the head of the queue.
    pub fn requeue(&mut self, message: OutboundMessage) {
        self.messages.push_front(message);
    }

    pub fn pop(&mut self) -> Option<OutboundMessage> {
        self.messages.pop_front()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages lost to the queue limit so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Pause between two drained messages for a rate in messages per second.
///
/// A non-positive or non-finite rate drains without pausing.
pub fn drain_interval(messages_per_second: f32) -> Option<Duration> {
    if messages_per_second.is_finite() && messages_per_second > 0.0 {
        Some(Duration::from_secs_f64(1.0 / messages_per_second as f64))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(n: u8) -> OutboundMessage {
        OutboundMessage::new("input/test", &[n], QoS::AtMostOnce)
    }

    #[test]
    fn test_queue_limit_from_size() {
        assert_eq!(Ok(QueueLimit::Unbounded), QueueLimit::try_from(-1));
        assert_eq!(Ok(QueueLimit::Disabled), QueueLimit::try_from(0));
        assert_eq!(
            Ok(QueueLimit::Bounded(NonZeroUsize::new(10).unwrap())),
            QueueLimit::try_from(10)
        );
        assert_eq!(Err(InvalidQueueSize(-2)), QueueLimit::try_from(-2));
    }

    #[test]
    fn test_unbounded_keeps_order() {
        let mut queue = OfflineQueue::new(QueueLimit::Unbounded, DropBehavior::Oldest);
        for n in 0..100 {
            queue.push(message(n)).unwrap();
        }
        assert_eq!(100, queue.len());
        for n in 0..100 {
            assert_eq!(Some(message(n)), queue.pop());
        }
        assert!(queue.is_empty());
        assert_eq!(0, queue.dropped());
    }

    #[test]
    fn test_bounded_drops_oldest() {
        let limit = QueueLimit::Bounded(NonZeroUsize::new(2).unwrap());
        let mut queue = OfflineQueue::new(limit, DropBehavior::Oldest);
        queue.push(message(1)).unwrap();
        queue.push(message(2)).unwrap();
        queue.push(message(3)).unwrap();
        assert_eq!(2, queue.len());
        assert_eq!(1, queue.dropped());
        assert_eq!(Some(message(2)), queue.pop());
        assert_eq!(Some(message(3)), queue.pop());
    }

    #[test]
    fn test_bounded_rejects_newest() {
        let limit = QueueLimit::Bounded(NonZeroUsize::new(1).unwrap());
        let mut queue = OfflineQueue::new(limit, DropBehavior::Newest);
        queue.push(message(1)).unwrap();
        assert!(matches!(
            queue.push(message(2)),
            Err(TransportError::QueueFull)
        ));
        assert_eq!(Some(message(1)), queue.pop());
    }

    #[test]
    fn test_disabled_queue() {
        let mut queue = OfflineQueue::new(QueueLimit::Disabled, DropBehavior::Oldest);
        assert!(matches!(
            queue.push(message(1)),
            Err(TransportError::NotConnected)
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_goes_first() {
        let mut queue = OfflineQueue::new(QueueLimit::Unbounded, DropBehavior::Oldest);
        queue.push(message(1)).unwrap();
        queue.push(message(2)).unwrap();
        let head = queue.pop().unwrap();
        queue.requeue(head);
        assert_eq!(Some(message(1)), queue.pop());
    }

    #[test]
    fn test_drain_interval() {
        assert_eq!(Some(Duration::from_millis(200)), drain_interval(5.0));
        assert_eq!(None, drain_interval(0.0));
        assert_eq!(None, drain_interval(-1.0));
        assert_eq!(None, drain_interval(f32::NAN));
    }
}
