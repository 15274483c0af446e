//! Pairs broker acknowledgements with the request that asked for them.
//!
//! The client does not learn the packet id of a request when handing it to the event loop, so
//! requests are recorded in the order they enter the request channel and bound to a packet id
//! when the event loop reports them as sent. Publishes resent after a reconnect keep their
//! packet id and do not consume a new record.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Raised with the broker's verdict once a request is acknowledged.
pub type AckSignal = Signal<CriticalSectionRawMutex, Result<(), String>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Packet {
    Publish,
    Subscribe,
}

struct Request {
    packet: Packet,
    waiter: Option<Arc<AckSignal>>,
}

#[derive(Default)]
pub struct Acknowledgements {
    requested: VecDeque<Request>,
    sent: HashMap<(Packet, u16), Option<Arc<AckSignal>>>,
}

impl Acknowledgements {
    /// Records a request just handed to the client. Must be called in channel order.
    pub fn requested(&mut self, packet: Packet, waiter: Option<Arc<AckSignal>>) {
        self.requested.push_back(Request { packet, waiter });
    }

    /// Binds the oldest recorded request to the packet id the event loop sent it with.
    ///
    /// At most once publishes are sent with packet id 0 and are never acknowledged.
    pub fn sent(&mut self, packet: Packet, pkid: u16) {
        if pkid != 0 && self.sent.contains_key(&(packet, pkid)) {
            log::debug!("{:?} {} resent", packet, pkid);
            return;
        }
        let Some(request) = self.requested.pop_front() else {
            log::debug!("{:?} {} was not recorded", packet, pkid);
            return;
        };
        if request.packet != packet {
            log::warn!("Sent {:?} {} where {:?} was expected", packet, pkid, request.packet);
        }
        if pkid != 0 {
            self.sent.insert((packet, pkid), request.waiter);
        }
    }

    /// Hands the broker's verdict to whoever waits for packet `pkid`.
    pub fn acknowledged(&mut self, packet: Packet, pkid: u16, result: Result<(), String>) {
        match self.sent.remove(&(packet, pkid)) {
            Some(Some(waiter)) => waiter.signal(result),
            Some(None) => {}
            None => log::debug!("Unexpected acknowledgement for {:?} {}", packet, pkid),
        }
    }

    /// Forgets every request, failing those still waited for.
    pub fn clear(&mut self) {
        let waiters = self
            .requested
            .drain(..)
            .filter_map(|r| r.waiter)
            .chain(self.sent.drain().filter_map(|(_, waiter)| waiter));
        for waiter in waiters {
            waiter.signal(Err("session closed".to_string()));
        }
    }

    /// Requests not acknowledged yet.
    pub fn pending(&self) -> usize {
        self.requested.len() + self.sent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waiter() -> Arc<AckSignal> {
        Arc::new(AckSignal::new())
    }

    #[test]
    fn test_ack_of_earlier_publish_is_not_taken() {
        let mut acks = Acknowledgements::default();
        let live = waiter();
        // a drained message goes out right before a live publish
        acks.requested(Packet::Publish, None);
        acks.requested(Packet::Publish, Some(live.clone()));
        acks.sent(Packet::Publish, 1);
        acks.sent(Packet::Publish, 2);

        acks.acknowledged(Packet::Publish, 1, Ok(()));
        assert!(!live.signaled());

        acks.acknowledged(Packet::Publish, 2, Ok(()));
        assert_eq!(Some(Ok(())), live.try_take());
        assert_eq!(0, acks.pending());
    }

    #[test]
    fn test_at_most_once_publish_is_skipped() {
        let mut acks = Acknowledgements::default();
        let subscribe = waiter();
        acks.requested(Packet::Publish, None);
        acks.requested(Packet::Subscribe, Some(subscribe.clone()));
        acks.sent(Packet::Publish, 0);
        acks.sent(Packet::Subscribe, 7);

        acks.acknowledged(Packet::Subscribe, 7, Err("refused".to_string()));
        assert_eq!(Some(Err("refused".to_string())), subscribe.try_take());
    }

    #[test]
    fn test_resent_publish_keeps_its_waiter() {
        let mut acks = Acknowledgements::default();
        let first = waiter();
        let second = waiter();
        acks.requested(Packet::Publish, Some(first.clone()));
        acks.sent(Packet::Publish, 1);
        acks.requested(Packet::Publish, Some(second.clone()));
        // reconnected: packet 1 goes out again ahead of the new request
        acks.sent(Packet::Publish, 1);
        acks.sent(Packet::Publish, 2);

        acks.acknowledged(Packet::Publish, 1, Ok(()));
        assert!(first.signaled());
        assert!(!second.signaled());
        acks.acknowledged(Packet::Publish, 2, Ok(()));
        assert!(second.signaled());
    }

    #[test]
    fn test_clear_fails_waiters() {
        let mut acks = Acknowledgements::default();
        let sent = waiter();
        let queued = waiter();
        acks.requested(Packet::Publish, Some(sent.clone()));
        acks.sent(Packet::Publish, 3);
        acks.requested(Packet::Subscribe, Some(queued.clone()));

        acks.clear();
        assert!(matches!(sent.try_take(), Some(Err(_))));
        assert!(matches!(queued.try_take(), Some(Err(_))));
        assert_eq!(0, acks.pending());
    }
}
