//! Scoped entity-creation notifications
//!
//! Replaces a process-wide "last created entity" variable: each caller owns a
//! listener and reads the ids it was sent. Dropping the listener disconnects
//! the channel, and the publisher prunes it on the next send.

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use std::time::Duration;

use super::EntityId;

/// Receiving end handed to a subscriber
#[derive(Debug)]
pub struct CreationListener {
    rx: Receiver<EntityId>,
}

impl CreationListener {
    /// Next created entity, if one was already announced
    pub fn try_next(&self) -> Option<EntityId> {
        match self.rx.try_recv() {
            Ok(id) => Some(id),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next created entity
    pub fn next_within(&self, timeout: Duration) -> Option<EntityId> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Publishing side kept by the editor implementation
#[derive(Debug, Default)]
pub struct CreationPublisher {
    subscribers: Vec<Sender<EntityId>>,
}

impl CreationPublisher {
    pub fn subscribe(&mut self) -> CreationListener {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        CreationListener { rx }
    }

    pub fn publish(&mut self, id: EntityId) {
        self.subscribers.retain(|tx| tx.send(id).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_receives_in_order() {
        let mut publisher = CreationPublisher::default();
        let listener = publisher.subscribe();

        publisher.publish(EntityId(1));
        publisher.publish(EntityId(2));

        assert_eq!(listener.try_next(), Some(EntityId(1)));
        assert_eq!(listener.next_within(Duration::from_millis(10)), Some(EntityId(2)));
        assert_eq!(listener.try_next(), None);
        assert_eq!(listener.next_within(Duration::from_millis(1)), None);
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let mut publisher = CreationPublisher::default();
        let kept = publisher.subscribe();
        {
            let _dropped = publisher.subscribe();
            assert_eq!(publisher.subscriber_count(), 2);
        }

        publisher.publish(EntityId(5));
        assert_eq!(publisher.subscriber_count(), 1);
        assert_eq!(kept.try_next(), Some(EntityId(5)));
    }
}
