use chrono::{Duration, NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::model::*;

use super::availability::busy_seat_names;
use super::timeline::{location_timelines, seat_timeline, SeatTimeline, TimelineWindow};
use super::{Engine, EngineError};

// Entity-to-response mapping is explicit per use case: a member sees their
// role and access code, the owning admin sees the group composition. No
// loosely-typed record bags.

/// A member's own view of one of their bookings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserBookingView {
    pub booking_id: Ulid,
    pub seat_id: Ulid,
    pub seat_name: String,
    pub span: TimeSpan,
    pub people_amount: u32,
    pub features: Vec<String>,
    pub comment: Option<String>,
    pub code: String,
    pub role: MemberRole,
}

/// The owning admin's view of a booking in their location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminBookingView {
    pub booking_id: Ulid,
    pub seat_id: Ulid,
    pub seat_name: String,
    pub span: TimeSpan,
    pub people_amount: u32,
    pub comment: Option<String>,
    pub creator: Option<UserId>,
    pub member_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberView {
    pub user_id: UserId,
    pub role: MemberRole,
}

impl Engine {
    /// Bookings the user belongs to that have not ended yet, across all
    /// locations.
    pub async fn user_bookings(&self, user_id: UserId) -> Vec<UserBookingView> {
        let now = self.clock.now();
        let mut views = Vec::new();
        for location_id in self.store.location_ids() {
            let Some(shard) = self.store.get_location(&location_id) else {
                continue;
            };
            let state = shard.read().await;
            for member in state.members.iter().filter(|m| m.user_id == user_id) {
                let Some(reservation) = state.reservation(&member.reservation_id) else {
                    continue;
                };
                if reservation.span.end <= now {
                    continue;
                }
                let Some(seat) = state.seat(&reservation.seat_id) else {
                    continue;
                };
                views.push(UserBookingView {
                    booking_id: reservation.id,
                    seat_id: seat.id,
                    seat_name: seat.name.clone(),
                    span: reservation.span,
                    people_amount: reservation.people_amount,
                    features: reservation.features.clone(),
                    comment: reservation.comment.clone(),
                    code: reservation.code.clone(),
                    role: member.role,
                });
            }
        }
        views
    }

    /// Every booking in a location, for the admin that owns it.
    pub async fn location_bookings(
        &self,
        location_id: Ulid,
        admin_id: Ulid,
    ) -> Result<Vec<AdminBookingView>, EngineError> {
        let shard = self.location_state(&location_id)?;
        let state = shard.read().await;
        if state.location.admin_id != admin_id {
            return Err(EngineError::Forbidden("not your location"));
        }
        Ok(state
            .reservations
            .iter()
            .filter_map(|reservation| {
                let seat = state.seat(&reservation.seat_id)?;
                Some(AdminBookingView {
                    booking_id: reservation.id,
                    seat_id: seat.id,
                    seat_name: seat.name.clone(),
                    span: reservation.span,
                    people_amount: reservation.people_amount,
                    comment: reservation.comment.clone(),
                    creator: state.creator_of(&reservation.id),
                    member_count: state.members_of(&reservation.id).count(),
                })
            })
            .collect())
    }

    pub async fn booking_members(
        &self,
        reservation_id: Ulid,
    ) -> Result<Vec<MemberView>, EngineError> {
        let (_, shard) = self.resolve_reservation(&reservation_id)?;
        let state = shard.read().await;
        Ok(state
            .members_of(&reservation_id)
            .map(|m| MemberView {
                user_id: m.user_id,
                role: m.role,
            })
            .collect())
    }

    /// Seat names already taken somewhere inside `[start, start + hours)`.
    pub async fn busy_seats(
        &self,
        location_id: Ulid,
        time_start: NaiveDateTime,
        hours: u32,
    ) -> Result<Vec<String>, EngineError> {
        if hours == 0 {
            return Err(EngineError::Invalid("window must cover at least one hour"));
        }
        let shard = self.location_state(&location_id)?;
        let state = shard.read().await;
        let span = TimeSpan::new(time_start, time_start + Duration::hours(hours as i64));
        Ok(busy_seat_names(&state, &span))
    }

    /// Occupancy bitmaps for one seat or for the whole location.
    pub async fn occupancy(
        &self,
        location_id: Ulid,
        seat_name: Option<&str>,
        date: NaiveDate,
        window: TimelineWindow,
        ignore: Option<Ulid>,
    ) -> Result<Vec<SeatTimeline>, EngineError> {
        let shard = self.location_state(&location_id)?;
        let state = shard.read().await;
        match seat_name {
            Some(name) => {
                let seat = state
                    .seat_by_name(name)
                    .ok_or_else(|| EngineError::UnknownSeat(name.to_string()))?;
                let seat_id = seat.id;
                let seat_name = seat.name.clone();
                let slots = seat_timeline(&state, name, date, window, ignore)
                    .ok_or_else(|| EngineError::UnknownSeat(name.to_string()))?;
                Ok(vec![SeatTimeline {
                    seat_id,
                    seat_name,
                    slots,
                }])
            }
            None => Ok(location_timelines(&state, date, window, false, ignore)),
        }
    }

    /// The user's standing queue entries, across all locations.
    pub async fn user_queue_entries(&self, user_id: UserId) -> Vec<QueueEntry> {
        let mut entries = Vec::new();
        for location_id in self.store.location_ids() {
            let Some(shard) = self.store.get_location(&location_id) else {
                continue;
            };
            let state = shard.read().await;
            entries.extend(state.queue.iter().filter(|q| q.user_id == user_id).cloned());
        }
        entries
    }
}
