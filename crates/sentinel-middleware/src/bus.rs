//! Mode-change notification bus.
//!
//! The system state machine publishes a [`ModeChange`] every time the
//! operating mode moves; the indicator subsystem (and anything else that
//! wants to follow along, such as the CLI status printer) subscribes.
//!
//! Uses [`tokio::sync::broadcast`] so every subscriber sees every change and
//! a slow subscriber never blocks the publisher.  Notifications are
//! fire-and-forget: a publisher never learns whether anyone listened.

use sentinel_types::SystemMode;
use tokio::sync::broadcast;
use tracing::warn;

/// Default number of buffered notifications before slow subscribers lag.
const DEFAULT_CAPACITY: usize = 32;

/// A single operating-mode transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub from: SystemMode,
    pub to: SystemMode,
    /// Monotonic tick (ms since boot) of the transition.
    pub tick_ms: u64,
}

/// Shared notification bus.  Clone it cheaply; all clones share one channel.
#[derive(Clone, Debug)]
pub struct ModeBus {
    sender: broadcast::Sender<ModeChange>,
}

impl ModeBus {
    /// Create a bus buffering up to `capacity` notifications per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `change` to every current subscriber.
    ///
    /// Returns the number of subscribers that were handed the notification;
    /// `0` when nobody is listening, which is a normal condition.
    pub fn publish(&self, change: ModeChange) -> usize {
        self.sender.send(change).unwrap_or(0)
    }

    pub fn subscribe(&self) -> ModeSubscriber {
        ModeSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ModeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving end of the [`ModeBus`].
pub struct ModeSubscriber {
    receiver: broadcast::Receiver<ModeChange>,
}

impl ModeSubscriber {
    /// Wait for the next mode change.
    ///
    /// Lagging is logged and skipped over; only the notifications still in
    /// the buffer are delivered.  Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ModeChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "mode subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(to: SystemMode, tick_ms: u64) -> ModeChange {
        ModeChange {
            from: SystemMode::Normal,
            to,
            tick_ms,
        }
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = ModeBus::default();
        assert_eq!(bus.publish(change(SystemMode::Warning, 1)), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_change() {
        let bus = ModeBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.publish(change(SystemMode::ObcFault, 10)), 2);
        assert_eq!(a.recv().await, Some(change(SystemMode::ObcFault, 10)));
        assert_eq!(b.recv().await, Some(change(SystemMode::ObcFault, 10)));
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_buffered_changes() {
        let bus = ModeBus::new(2);
        let mut slow = bus.subscribe();
        for tick in 0..5 {
            bus.publish(change(SystemMode::Warning, tick));
        }
        // Only the last two survive in a capacity-2 buffer.
        assert_eq!(slow.recv().await.map(|c| c.tick_ms), Some(3));
        assert_eq!(slow.recv().await.map(|c| c.tick_ms), Some(4));
    }

    #[tokio::test]
    async fn recv_returns_none_after_bus_dropped() {
        let bus = ModeBus::default();
        let mut sub = bus.subscribe();
        drop(bus);
        assert_eq!(sub.recv().await, None);
    }
}
