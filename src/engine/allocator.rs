use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Timelike};
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::clock::{next_full_hour, on_the_hour};
use crate::model::*;
use crate::store::LocationState;

use super::availability::{first_overlap, is_seat_free};
use super::{matcher, Engine, EngineError};

/// What a caller asks the allocator for.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub location_id: Ulid,
    pub seat_name: String,
    pub time_start: NaiveDateTime,
    pub hours: u32,
    pub people_amount: u32,
    pub features: Vec<String>,
    pub comment: Option<String>,
}

/// Validated edit of an existing booking.
#[derive(Debug, Clone)]
pub struct BookingUpdate {
    pub time_start: NaiveDateTime,
    pub hours: u32,
    pub features: Vec<String>,
    pub comment: Option<String>,
}

/// Result of a queue-join: either the request was satisfiable right away and
/// became a booking, or it is now waiting in the queue.
#[derive(Debug, Clone)]
pub enum QueueOutcome {
    Booked(Reservation),
    Queued(QueueEntry),
}

/// Validate and insert a reservation plus its Creator member. The caller
/// holds the location write guard, so the duplicate-day and overlap checks
/// and the insert are one atomic step — of two racing creates, the second
/// re-checks here and loses with `Overlap`.
pub(super) fn create_booking_locked(
    state: &mut LocationState,
    user_id: UserId,
    req: &BookingRequest,
) -> Result<Reservation, EngineError> {
    if req.hours == 0 {
        return Err(EngineError::Invalid("booking must cover at least one hour"));
    }
    if req.people_amount == 0 {
        return Err(EngineError::Invalid("people_amount must be at least 1"));
    }
    let (seat_id, max_occupants) = match state.seat_by_name(&req.seat_name) {
        Some(seat) => (seat.id, seat.max_occupants),
        None => return Err(EngineError::UnknownSeat(req.seat_name.clone())),
    };
    if req.people_amount > max_occupants {
        return Err(EngineError::CapacityExceeded(max_occupants));
    }

    let span = TimeSpan::new(
        req.time_start,
        req.time_start + Duration::hours(req.hours as i64),
    );
    if !state.location.is_always_open()
        && (span.start.hour() < state.location.open_hour
            || span.start.hour() + req.hours > state.location.close_hour)
    {
        return Err(EngineError::OutsideOpenHours);
    }
    if state.user_has_booking_on(user_id, span.start.date()) {
        return Err(EngineError::DuplicateBooking);
    }
    if let Some(existing) = first_overlap(state, &seat_id, &span, None) {
        return Err(EngineError::Overlap(existing));
    }

    let reservation = Reservation::new(
        Ulid::new(),
        seat_id,
        span,
        req.people_amount,
        req.features.clone(),
        req.comment.clone(),
    );
    state.insert_reservation(reservation.clone(), user_id);
    Ok(reservation)
}

impl Engine {
    // ── Admin mutations ──────────────────────────────────────

    pub fn create_location(
        &self,
        admin_id: Ulid,
        name: &str,
        address: &str,
        open_hour: u32,
        close_hour: u32,
    ) -> Result<Location, EngineError> {
        if open_hour > 24 || close_hour > 24 || open_hour >= close_hour {
            return Err(EngineError::Invalid(
                "operating hours must satisfy 0 <= open < close <= 24",
            ));
        }
        let location = Location {
            id: Ulid::new(),
            admin_id,
            name: name.into(),
            address: address.into(),
            open_hour,
            close_hour,
        };
        self.store.insert_location(
            location.id,
            Arc::new(RwLock::new(LocationState::new(location.clone()))),
        );
        Ok(location)
    }

    pub async fn add_seat(
        &self,
        location_id: Ulid,
        name: &str,
        features: Vec<String>,
        max_occupants: u32,
    ) -> Result<Seat, EngineError> {
        if max_occupants == 0 {
            return Err(EngineError::Invalid("a seat must hold at least one occupant"));
        }
        let shard = self.location_state(&location_id)?;
        let mut state = shard.write().await;
        if let Some(existing) = state.seat_by_name(name) {
            return Err(EngineError::AlreadyExists(existing.id));
        }
        let seat = Seat {
            id: Ulid::new(),
            location_id,
            name: name.into(),
            features,
            max_occupants,
        };
        state.seats.push(seat.clone());
        Ok(seat)
    }

    /// Remove a seat and cascade away its reservations.
    pub async fn remove_seat(&self, location_id: Ulid, seat_id: Ulid) -> Result<(), EngineError> {
        let shard = self.location_state(&location_id)?;
        let mut state = shard.write().await;
        let pos = state
            .seats
            .iter()
            .position(|s| s.id == seat_id)
            .ok_or(EngineError::NotFound(seat_id))?;
        state.seats.remove(pos);

        let doomed: Vec<Ulid> = state.reservations_on_seat(&seat_id).map(|r| r.id).collect();
        for id in &doomed {
            state.remove_reservation(id);
            self.store.unmap_reservation(id);
        }
        Ok(())
    }

    // ── Booking lifecycle ────────────────────────────────────

    pub async fn create_booking(
        &self,
        user_id: UserId,
        req: BookingRequest,
    ) -> Result<Reservation, EngineError> {
        let shard = self.location_state(&req.location_id)?;
        let mut state = shard.write().await;

        let reservation = create_booking_locked(&mut state, user_id, &req)?;
        self.store.map_reservation(reservation.id, req.location_id);
        self.notify.send(
            req.location_id,
            &LiveEvent::booking_created(&req.seat_name, &reservation.span),
        );
        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        Ok(reservation)
    }

    pub async fn update_booking(
        &self,
        reservation_id: Ulid,
        actor: Actor,
        update: BookingUpdate,
    ) -> Result<Reservation, EngineError> {
        if update.hours == 0 {
            return Err(EngineError::Invalid("booking must cover at least one hour"));
        }
        let (location_id, shard) = self.resolve_reservation(&reservation_id)?;
        let mut state = shard.write().await;
        let now = self.clock.now();

        if let Actor::User(user_id) = actor
            && state.creator_of(&reservation_id) != Some(user_id) {
                return Err(EngineError::Forbidden("only the booking creator may edit"));
            }

        let current = state
            .reservation(&reservation_id)
            .cloned()
            .ok_or(EngineError::NotFound(reservation_id))?;
        let seat = state
            .seat(&current.seat_id)
            .cloned()
            .ok_or(EngineError::NotFound(current.seat_id))?;

        let span = TimeSpan::new(
            update.time_start,
            update.time_start + Duration::hours(update.hours as i64),
        );
        if span.end < now {
            return Err(EngineError::AlreadyEnded);
        }
        if span.start < current.span.start {
            return Err(EngineError::Invalid(
                "the start cannot move earlier than it already is",
            ));
        }
        if !state.location.is_always_open()
            && (span.start.hour() < state.location.open_hour
                || span.end.hour() > state.location.close_hour)
        {
            return Err(EngineError::OutsideOpenHours);
        }
        if let Some(existing) = first_overlap(&state, &seat.id, &span, Some(reservation_id)) {
            return Err(EngineError::Overlap(existing));
        }

        let reservation = state
            .reservation_mut(&reservation_id)
            .ok_or(EngineError::NotFound(reservation_id))?;
        reservation.span = span;
        reservation.features = update.features;
        reservation.comment = update.comment;
        let updated = reservation.clone();

        self.notify
            .send(location_id, &LiveEvent::booking_updated(&seat.name, &span));
        metrics::counter!(crate::observability::BOOKINGS_UPDATED_TOTAL).increment(1);

        // A shortened or moved booking may have freed capacity on a
        // single-occupant seat — re-offer it to the queue right away.
        if seat.is_single_occupant() {
            let exclude = match actor {
                Actor::User(user_id) => Some(user_id),
                Actor::Admin => None,
            };
            matcher::refill_from_queue(
                self,
                &mut state,
                current.span.start.date(),
                on_the_hour(now),
                exclude,
            );
        }
        Ok(updated)
    }

    pub async fn cancel_booking(
        &self,
        reservation_id: Ulid,
        actor: Actor,
    ) -> Result<(), EngineError> {
        let (location_id, shard) = self.resolve_reservation(&reservation_id)?;
        let mut state = shard.write().await;
        let now = self.clock.now();

        let current = state
            .reservation(&reservation_id)
            .cloned()
            .ok_or(EngineError::NotFound(reservation_id))?;
        if current.span.end < now {
            return Err(EngineError::AlreadyEnded);
        }
        if let Actor::User(user_id) = actor
            && state.creator_of(&reservation_id) != Some(user_id) {
                return Err(EngineError::Forbidden("only the booking creator may cancel"));
            }
        let seat = state
            .seat(&current.seat_id)
            .cloned()
            .ok_or(EngineError::NotFound(current.seat_id))?;

        state.remove_reservation(&reservation_id);
        self.store.unmap_reservation(&reservation_id);
        self.notify.send(
            location_id,
            &LiveEvent::booking_canceled(&seat.name, &current.span),
        );
        metrics::counter!(crate::observability::BOOKINGS_CANCELED_TOTAL).increment(1);

        if seat.is_single_occupant() {
            let exclude = match actor {
                Actor::User(user_id) => Some(user_id),
                Actor::Admin => None,
            };
            matcher::refill_from_queue(
                self,
                &mut state,
                current.span.start.date(),
                on_the_hour(now),
                exclude,
            );
        }
        Ok(())
    }

    /// Add a user to a booking's group. Idempotent for existing members.
    pub async fn join_booking(
        &self,
        reservation_id: Ulid,
        user_id: UserId,
    ) -> Result<ReservationMember, EngineError> {
        let (_, shard) = self.resolve_reservation(&reservation_id)?;
        let mut state = shard.write().await;

        let people_amount = state
            .reservation(&reservation_id)
            .ok_or(EngineError::NotFound(reservation_id))?
            .people_amount;
        if let Some(member) = state.membership(&reservation_id, user_id) {
            return Ok(member.clone());
        }
        if state.members_of(&reservation_id).count() >= people_amount as usize {
            return Err(EngineError::GroupFull(people_amount));
        }
        let member = ReservationMember {
            reservation_id,
            user_id,
            role: MemberRole::Member,
        };
        state.members.push(member.clone());
        Ok(member)
    }

    // ── Queue lifecycle ──────────────────────────────────────

    /// Join the location's queue — or skip it entirely when a single-occupant
    /// seat is free for the whole window, in which case the request becomes a
    /// booking on the spot.
    pub async fn join_queue(
        &self,
        user_id: UserId,
        location_id: Ulid,
        date: Option<NaiveDateTime>,
        hours: u32,
        comment: Option<String>,
    ) -> Result<QueueOutcome, EngineError> {
        if hours == 0 {
            return Err(EngineError::Invalid("a queue request must cover at least one hour"));
        }
        let shard = self.location_state(&location_id)?;
        let mut state = shard.write().await;
        let now = self.clock.now();

        let start = date.unwrap_or_else(|| next_full_hour(now));
        let span = TimeSpan::new(start, start + Duration::hours(hours as i64));

        if state.user_queued_on(user_id, start.date()) {
            return Err(EngineError::AlreadyQueued);
        }
        if span.start.hour() < state.location.open_hour
            || span.end.hour() >= state.location.close_hour
        {
            return Err(EngineError::OutsideOpenHours);
        }

        let free_seat = state
            .single_occupant_seats()
            .map(|s| s.name.clone())
            .find(|name| is_seat_free(&state, name, &span, None));
        if let Some(seat_name) = free_seat {
            let req = BookingRequest {
                location_id,
                seat_name: seat_name.clone(),
                time_start: start,
                hours,
                people_amount: 1,
                features: Vec::new(),
                comment,
            };
            let reservation = create_booking_locked(&mut state, user_id, &req)?;
            self.store.map_reservation(reservation.id, location_id);
            self.notify.send(
                location_id,
                &LiveEvent::booking_created(&seat_name, &reservation.span),
            );
            metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
            return Ok(QueueOutcome::Booked(reservation));
        }

        let entry = QueueEntry {
            id: Ulid::new(),
            location_id,
            user_id,
            date: Some(start),
            hours,
            comment,
            created_at: now,
        };
        state.queue.push(entry.clone());
        self.store.map_queue_entry(entry.id, location_id);
        Ok(QueueOutcome::Queued(entry))
    }

    pub async fn leave_queue(&self, entry_id: Ulid, user_id: UserId) -> Result<(), EngineError> {
        let (_, shard) = self.resolve_queue_entry(&entry_id)?;
        let mut state = shard.write().await;

        let entry = state
            .queue_entry(&entry_id)
            .ok_or(EngineError::NotFound(entry_id))?;
        if entry.user_id != user_id {
            return Err(EngineError::Forbidden("not your queue entry"));
        }
        state.remove_queue_entry(&entry_id);
        self.store.unmap_queue_entry(&entry_id);
        Ok(())
    }
}
