use dashmap::DashMap;
use tokio::sync::mpsc;
use ulid::Ulid;

use crate::model::{LiveEvent, UserId};

pub type EventSink = mpsc::UnboundedSender<LiveEvent>;

/// Fan-out hub for per-location live channels. Explicitly constructed and
/// injected — never a process global — so lifecycle and test isolation stay
/// under the caller's control.
///
/// Delivery is fire-and-forget broadcast: a subscriber that is gone or whose
/// sink errors is skipped and pruned, and no failure ever reaches the caller.
pub struct NotifyHub {
    channels: DashMap<Ulid, DashMap<UserId, EventSink>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Register a subscriber's sink under a location. A reconnect with the
    /// same subscriber id replaces the previous sink.
    pub fn register(&self, location_id: Ulid, subscriber_id: UserId, sink: EventSink) {
        self.channels
            .entry(location_id)
            .or_default()
            .insert(subscriber_id, sink);
        metrics::gauge!(crate::observability::LIVE_SUBSCRIBERS_ACTIVE).increment(1.0);
    }

    pub fn unregister(&self, location_id: &Ulid, subscriber_id: &UserId) {
        if let Some(subs) = self.channels.get(location_id)
            && subs.remove(subscriber_id).is_some() {
                metrics::gauge!(crate::observability::LIVE_SUBSCRIBERS_ACTIVE).decrement(1.0);
            }
    }

    /// Open a channel and register its sender; the receiver is the live
    /// connection's read side.
    pub fn subscribe(
        &self,
        location_id: Ulid,
        subscriber_id: UserId,
    ) -> mpsc::UnboundedReceiver<LiveEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.register(location_id, subscriber_id, tx);
        rx
    }

    /// Deliver `event` to every current subscriber of the location. No-op if
    /// nobody is listening.
    pub fn send(&self, location_id: Ulid, event: &LiveEvent) {
        let Some(subs) = self.channels.get(&location_id) else {
            return;
        };
        let mut dead = Vec::new();
        for entry in subs.iter() {
            if entry.value().send(event.clone()).is_err() {
                dead.push(*entry.key());
            }
        }
        for subscriber_id in dead {
            subs.remove(&subscriber_id);
            metrics::gauge!(crate::observability::LIVE_SUBSCRIBERS_ACTIVE).decrement(1.0);
        }
    }

    pub fn subscriber_count(&self, location_id: &Ulid) -> usize {
        self.channels.get(location_id).map_or(0, |subs| subs.len())
    }

    /// Drop a location's whole channel (e.g. when the location is deleted).
    pub fn remove_location(&self, location_id: &Ulid) {
        self.channels.remove(location_id);
    }
}
