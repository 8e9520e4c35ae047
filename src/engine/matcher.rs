use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};
use tracing::{debug, warn};

use crate::clock::next_full_hour;
use crate::messenger::MessageAction;
use crate::model::{LiveEvent, UserId};
use crate::store::LocationState;

use super::allocator::{create_booking_locked, BookingRequest};
use super::timeline::{location_timelines, longest_free_run, TimelineWindow, HOURS_PER_DAY};
use super::Engine;

/// Re-offer freed single-occupant capacity to the location's queue.
///
/// Runs under the location write guard the caller already holds, so
/// promotions are strictly sequential: one entry is evaluated, committed and
/// the bitmaps rebuilt before the next is looked at — two entries can never
/// race for the same freed block. Per-entry failures are logged and the entry
/// stays queued; the pass itself always finishes.
///
/// Returns the number of entries promoted.
pub(super) fn refill_from_queue(
    engine: &Engine,
    state: &mut LocationState,
    anchor: NaiveDate,
    now: NaiveDateTime,
    exclude_user: Option<UserId>,
) -> usize {
    let mut timelines = location_timelines(state, anchor, TimelineWindow::TwoDays, true, None);
    if timelines.is_empty() {
        return 0;
    }
    let mut promoted = 0;

    for entry in state.queue_for_day(anchor) {
        if exclude_user == Some(entry.user_id) {
            continue;
        }

        // An open entry asks for "the next full hour onward" — it only
        // competes when that hour falls on the anchor day.
        let candidate = entry.date.unwrap_or_else(|| next_full_hour(now));
        if candidate.date() != anchor {
            continue;
        }

        let candidate_hour = (candidate.hour() as usize).max(state.location.open_hour as usize);
        let window_end = if state.location.is_always_open() {
            timelines[0].slots.len()
        } else {
            state.location.close_hour as usize
        };
        if candidate_hour >= window_end {
            continue;
        }

        // Best seat = the one with the widest free block in the scan window.
        let mut best: Option<(usize, usize, usize)> = None;
        for (idx, timeline) in timelines.iter().enumerate() {
            let (run, start) = longest_free_run(&timeline.slots[candidate_hour..window_end]);
            if best.is_none_or(|(best_run, _, _)| run > best_run) {
                best = Some((run, start, idx));
            }
        }
        let Some((best_run, run_start, idx)) = best else {
            continue;
        };
        if entry.hours as usize > best_run {
            debug!(
                "queue entry of user {} wants {}h, best free block is {}h — no match",
                entry.user_id, entry.hours, best_run
            );
            continue;
        }

        let slot = candidate_hour + run_start;
        let (day_offset, start_hour) = (slot / HOURS_PER_DAY, slot % HOURS_PER_DAY);
        let Some(start_day) = anchor.checked_add_days(Days::new(day_offset as u64)) else {
            continue;
        };
        let Some(time_start) = start_day.and_hms_opt(start_hour as u32, 0, 0) else {
            continue;
        };

        let req = BookingRequest {
            location_id: state.location.id,
            seat_name: timelines[idx].seat_name.clone(),
            time_start,
            hours: entry.hours,
            people_amount: 1,
            features: Vec::new(),
            comment: entry.comment.clone(),
        };

        match create_booking_locked(state, entry.user_id, &req) {
            Ok(reservation) => {
                state.remove_queue_entry(&entry.id);
                engine.store.map_reservation(reservation.id, state.location.id);
                engine.store.unmap_queue_entry(&entry.id);
                engine.notify.send(
                    state.location.id,
                    &LiveEvent::booking_created(&req.seat_name, &reservation.span),
                );
                engine.send_direct(
                    entry.user_id,
                    format!(
                        "You were waiting in the queue and we booked you a seat:\n\
                         • Seat: {}\n• From: {}\n• Until: {}",
                        req.seat_name, reservation.span.start, reservation.span.end
                    ),
                    vec![MessageAction::cancel(reservation.id)],
                );
                metrics::counter!(crate::observability::QUEUE_PROMOTIONS_TOTAL).increment(1);
                metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
                promoted += 1;

                // The new booking invalidates the bitmaps — rebuild before
                // the next entry is evaluated.
                timelines =
                    location_timelines(state, anchor, TimelineWindow::TwoDays, true, None);
            }
            Err(e) => {
                // Likely lost a race for the block; the entry stays queued
                // and the next pass retries naturally.
                warn!("queue promotion for user {} skipped: {e}", entry.user_id);
            }
        }
    }

    promoted
}
