use std::sync::Arc;
use std::time::Duration as TickDuration;

use chrono::{Duration, NaiveDateTime};
use tokio::time::MissedTickBehavior;
use tracing::info;
use ulid::Ulid;

use crate::engine::Engine;
use crate::messenger::MessageAction;
use crate::model::LiveEvent;
use crate::store::LocationState;

/// How far ahead of a booking's end the "ending soon" prompt goes out.
const PRE_END_LOOKAHEAD_MINUTES: i64 = 3 * 60 + 10;
/// How far ahead of a booking's start the "starting soon" prompt goes out.
const PRE_START_LOOKAHEAD_HOURS: i64 = 4;
/// Window for the client-visibility events around start and end.
const CLIENT_WINDOW_HOURS: i64 = 3;

pub const DEFAULT_INTERVAL: TickDuration = TickDuration::from_secs(5);

/// Background task driving reconciliation on a fixed cadence, wholly
/// independent of request/response cycles. A tick that lands while the
/// previous pass is still running is skipped — never queued.
pub async fn run_reconciler(engine: Arc<Engine>, every: TickDuration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let now = engine.clock.now();
        if !engine.try_reconcile(now).await {
            tracing::debug!("reconcile tick skipped, previous pass still running");
        }
    }
}

impl Engine {
    /// Run one reconciliation pass unless one is already in flight
    /// (skip-if-busy). Returns whether a pass actually ran.
    pub async fn try_reconcile(&self, now: NaiveDateTime) -> bool {
        let Ok(_guard) = self.reconcile_gate.try_lock() else {
            metrics::counter!(crate::observability::RECONCILE_SKIPPED_TOTAL).increment(1);
            return false;
        };
        self.reconcile_pass(now).await;
        metrics::counter!(crate::observability::RECONCILE_PASSES_TOTAL).increment(1);
        true
    }

    async fn reconcile_pass(&self, now: NaiveDateTime) {
        for location_id in self.store.location_ids() {
            let Some(shard) = self.store.get_location(&location_id) else {
                continue;
            };
            let mut state = shard.write().await;
            self.purge_stale_queue_entries(&mut state, now);
            self.notify_endings_soon(&mut state, now);
            self.notify_starts_soon(&mut state, now);
            self.publish_elapsed(&mut state, location_id, now);
            self.publish_started(&mut state, location_id, now);
        }
    }

    /// Step 1: queue entries whose wished date has passed are dead weight.
    /// Open ("earliest available") entries carry no date and are kept.
    fn purge_stale_queue_entries(&self, state: &mut LocationState, now: NaiveDateTime) {
        let stale: Vec<Ulid> = state
            .queue
            .iter()
            .filter(|q| q.date.is_some_and(|d| d < now))
            .map(|q| q.id)
            .collect();
        for id in &stale {
            state.remove_queue_entry(id);
            self.store.unmap_queue_entry(id);
        }
        if !stale.is_empty() {
            info!("purged {} stale queue entries", stale.len());
        }
    }

    /// Step 2: "ending soon — extend?" to the creator, at most once per
    /// booking. The flag is set whether or not delivery succeeds.
    fn notify_endings_soon(&self, state: &mut LocationState, now: NaiveDateTime) {
        let horizon = now + Duration::minutes(PRE_END_LOOKAHEAD_MINUTES);
        let due: Vec<Ulid> = state
            .reservations
            .iter()
            .filter(|r| r.span.end <= horizon && r.span.end > now && !r.flags.pre_end)
            .map(|r| r.id)
            .collect();

        for id in due {
            let creator = state.creator_of(&id);
            let seat_name = state
                .reservation(&id)
                .and_then(|r| state.seat(&r.seat_id))
                .map(|s| s.name.clone());
            let Some(reservation) = state.reservation_mut(&id) else {
                continue;
            };
            reservation.flags.pre_end = true;

            let minutes_left = (reservation.span.end - now).num_minutes() + 1;
            if let (Some(creator), Some(seat_name)) = (creator, seat_name) {
                self.send_direct(
                    creator,
                    format!(
                        "Your booking ends soon.\n• Seat: {seat_name}\n\
                         • Time left: {minutes_left}min\nConsider extending it."
                    ),
                    vec![MessageAction::extend(id)],
                );
            }
        }
    }

    /// Step 3: "starting soon — cancel?" to the creator, at most once.
    fn notify_starts_soon(&self, state: &mut LocationState, now: NaiveDateTime) {
        let horizon = now + Duration::hours(PRE_START_LOOKAHEAD_HOURS);
        let due: Vec<Ulid> = state
            .reservations
            .iter()
            .filter(|r| r.span.start <= horizon && !r.flags.pre_start)
            .map(|r| r.id)
            .collect();

        for id in due {
            let creator = state.creator_of(&id);
            let seat_name = state
                .reservation(&id)
                .and_then(|r| state.seat(&r.seat_id))
                .map(|s| s.name.clone());
            let Some(reservation) = state.reservation_mut(&id) else {
                continue;
            };
            reservation.flags.pre_start = true;

            let minutes_until = (reservation.span.start - now).num_minutes() + 1;
            if let (Some(creator), Some(seat_name)) = (creator, seat_name) {
                self.send_direct(
                    creator,
                    format!(
                        "Your booking starts soon.\n• Seat: {seat_name}\n\
                         • Starts in: {minutes_until}min"
                    ),
                    vec![MessageAction::cancel(id)],
                );
            }
        }
    }

    /// Step 4: tell live subscribers a booking has run its course so they can
    /// refresh seat state. The event name is `booking_canceled` even though
    /// the booking simply elapsed — downstream consumers rely on it.
    fn publish_elapsed(&self, state: &mut LocationState, location_id: Ulid, now: NaiveDateTime) {
        let horizon = now + Duration::hours(CLIENT_WINDOW_HOURS);
        let due: Vec<Ulid> = state
            .reservations
            .iter()
            .filter(|r| r.span.end <= horizon && !r.flags.client_end)
            .map(|r| r.id)
            .collect();

        for id in due {
            let seat_name = state
                .reservation(&id)
                .and_then(|r| state.seat(&r.seat_id))
                .map(|s| s.name.clone());
            let Some(reservation) = state.reservation_mut(&id) else {
                continue;
            };
            reservation.flags.client_end = true;
            let span = reservation.span;
            if let Some(seat_name) = seat_name {
                self.notify
                    .send(location_id, &LiveEvent::booking_canceled(&seat_name, &span));
            }
        }
    }

    /// Step 5: symmetric client-visibility event for bookings about to start.
    fn publish_started(&self, state: &mut LocationState, location_id: Ulid, now: NaiveDateTime) {
        let horizon = now + Duration::hours(CLIENT_WINDOW_HOURS);
        let due: Vec<Ulid> = state
            .reservations
            .iter()
            .filter(|r| r.span.start <= horizon && !r.flags.client_start)
            .map(|r| r.id)
            .collect();

        for id in due {
            let seat_name = state
                .reservation(&id)
                .and_then(|r| state.seat(&r.seat_id))
                .map(|s| s.name.clone());
            let Some(reservation) = state.reservation_mut(&id) else {
                continue;
            };
            reservation.flags.client_start = true;
            let span = reservation.span;
            if let Some(seat_name) = seat_name {
                self.notify
                    .send(location_id, &LiveEvent::booking_started(&seat_name, &span));
            }
        }
    }
}
