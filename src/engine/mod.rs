mod allocator;
mod availability;
mod error;
mod matcher;
mod queries;
mod timeline;

pub use allocator::{BookingRequest, BookingUpdate, QueueOutcome};
pub use availability::{busy_seat_names, first_overlap, is_seat_free};
pub use error::EngineError;
pub use queries::{AdminBookingView, MemberView, UserBookingView};
pub use timeline::{
    location_timelines, longest_free_run, seat_timeline, SeatTimeline, TimelineWindow,
    HOURS_PER_DAY,
};

use std::sync::Arc;

use tokio::sync::Mutex;
use ulid::Ulid;

use crate::clock::Clock;
use crate::messenger::{MessageAction, Messenger};
use crate::model::UserId;
use crate::notify::NotifyHub;
use crate::store::{SharedLocationState, Store};

/// The booking allocation and reconciliation engine. One per process; every
/// caller (request handlers, the reconciler) shares it behind an `Arc`.
pub struct Engine {
    pub store: Store,
    pub notify: Arc<NotifyHub>,
    pub messenger: Arc<dyn Messenger>,
    pub clock: Clock,
    /// Single-flight gate for the reconciliation pass: a tick that finds it
    /// held is skipped, never queued.
    pub(crate) reconcile_gate: Mutex<()>,
}

impl Engine {
    pub fn new(notify: Arc<NotifyHub>, messenger: Arc<dyn Messenger>, clock: Clock) -> Self {
        Self {
            store: Store::new(),
            notify,
            messenger,
            clock,
            reconcile_gate: Mutex::new(()),
        }
    }

    pub(crate) fn location_state(&self, id: &Ulid) -> Result<SharedLocationState, EngineError> {
        self.store
            .get_location(id)
            .ok_or(EngineError::NotFound(*id))
    }

    /// Lookup reservation → owning location shard.
    pub(crate) fn resolve_reservation(
        &self,
        reservation_id: &Ulid,
    ) -> Result<(Ulid, SharedLocationState), EngineError> {
        let location_id = self
            .store
            .location_for_reservation(reservation_id)
            .ok_or(EngineError::NotFound(*reservation_id))?;
        Ok((location_id, self.location_state(&location_id)?))
    }

    pub(crate) fn resolve_queue_entry(
        &self,
        entry_id: &Ulid,
    ) -> Result<(Ulid, SharedLocationState), EngineError> {
        let location_id = self
            .store
            .location_for_queue_entry(entry_id)
            .ok_or(EngineError::NotFound(*entry_id))?;
        Ok((location_id, self.location_state(&location_id)?))
    }

    /// Hand a direct message to the messenger on a detached task. The
    /// triggering operation never awaits delivery; a failure is logged and
    /// goes nowhere else.
    pub(crate) fn send_direct(&self, user_id: UserId, text: String, actions: Vec<MessageAction>) {
        metrics::counter!(crate::observability::DIRECT_MESSAGES_TOTAL).increment(1);
        let messenger = self.messenger.clone();
        tokio::spawn(async move {
            if let Err(e) = messenger.send(user_id, &text, &actions).await {
                tracing::debug!("direct message to {user_id} dropped: {e}");
            }
        });
    }
}
