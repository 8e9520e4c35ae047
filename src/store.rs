use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

pub type SharedLocationState = Arc<RwLock<LocationState>>;

/// Everything owned by one location. A single write-guard acquisition on the
/// surrounding `RwLock` is the transaction boundary: overlap and duplicate
/// checks and the writes they protect happen under one guard, never split.
#[derive(Debug)]
pub struct LocationState {
    pub location: Location,
    pub seats: Vec<Seat>,
    pub reservations: Vec<Reservation>,
    pub members: Vec<ReservationMember>,
    pub queue: Vec<QueueEntry>,
}

impl LocationState {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            seats: Vec::new(),
            reservations: Vec::new(),
            members: Vec::new(),
            queue: Vec::new(),
        }
    }

    // ── Seats ────────────────────────────────────────────────

    pub fn seat_by_name(&self, name: &str) -> Option<&Seat> {
        self.seats.iter().find(|s| s.name == name)
    }

    pub fn seat(&self, id: &Ulid) -> Option<&Seat> {
        self.seats.iter().find(|s| s.id == *id)
    }

    pub fn single_occupant_seats(&self) -> impl Iterator<Item = &Seat> {
        self.seats.iter().filter(|s| s.is_single_occupant())
    }

    // ── Reservations ─────────────────────────────────────────

    pub fn reservation(&self, id: &Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == *id)
    }

    pub fn reservation_mut(&mut self, id: &Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == *id)
    }

    pub fn reservations_on_seat(&self, seat_id: &Ulid) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter().filter(move |r| r.seat_id == *seat_id)
    }

    /// Insert a reservation together with its Creator member — one step, so
    /// no reservation ever exists without exactly one creator.
    pub fn insert_reservation(&mut self, reservation: Reservation, creator: UserId) {
        let reservation_id = reservation.id;
        self.reservations.push(reservation);
        self.members.push(ReservationMember {
            reservation_id,
            user_id: creator,
            role: MemberRole::Creator,
        });
    }

    /// Remove a reservation and all of its members.
    pub fn remove_reservation(&mut self, id: &Ulid) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == *id)?;
        self.members.retain(|m| m.reservation_id != *id);
        Some(self.reservations.remove(pos))
    }

    // ── Members ──────────────────────────────────────────────

    pub fn members_of(&self, reservation_id: &Ulid) -> impl Iterator<Item = &ReservationMember> {
        self.members
            .iter()
            .filter(move |m| m.reservation_id == *reservation_id)
    }

    pub fn creator_of(&self, reservation_id: &Ulid) -> Option<UserId> {
        self.members_of(reservation_id)
            .find(|m| m.role == MemberRole::Creator)
            .map(|m| m.user_id)
    }

    pub fn membership(&self, reservation_id: &Ulid, user_id: UserId) -> Option<&ReservationMember> {
        self.members_of(reservation_id).find(|m| m.user_id == user_id)
    }

    /// Any reservation in this location on `date` where the user is a member.
    pub fn user_has_booking_on(&self, user_id: UserId, date: NaiveDate) -> bool {
        self.members.iter().any(|m| {
            m.user_id == user_id
                && self
                    .reservation(&m.reservation_id)
                    .is_some_and(|r| r.starts_on(date))
        })
    }

    // ── Queue ────────────────────────────────────────────────

    pub fn queue_entry(&self, id: &Ulid) -> Option<&QueueEntry> {
        self.queue.iter().find(|q| q.id == *id)
    }

    pub fn remove_queue_entry(&mut self, id: &Ulid) -> Option<QueueEntry> {
        let pos = self.queue.iter().position(|q| q.id == *id)?;
        Some(self.queue.remove(pos))
    }

    /// Entries competing for `date`: concrete wishes on that day plus open
    /// ("earliest available") entries. Most recently created first.
    pub fn queue_for_day(&self, date: NaiveDate) -> Vec<QueueEntry> {
        let mut entries: Vec<QueueEntry> = self
            .queue
            .iter()
            .filter(|q| q.date.is_none_or(|d| d.date() == date))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    pub fn user_queued_on(&self, user_id: UserId, date: NaiveDate) -> bool {
        self.queue
            .iter()
            .any(|q| q.user_id == user_id && q.date.is_some_and(|d| d.date() == date))
    }
}

/// In-memory transactional storage: per-location state shards plus reverse
/// lookups from reservation/queue-entry ids to their owning location.
pub struct Store {
    locations: DashMap<Ulid, SharedLocationState>,
    reservation_to_location: DashMap<Ulid, Ulid>,
    queue_to_location: DashMap<Ulid, Ulid>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            locations: DashMap::new(),
            reservation_to_location: DashMap::new(),
            queue_to_location: DashMap::new(),
        }
    }

    // ── Location shards ──────────────────────────────────────

    pub fn contains_location(&self, id: &Ulid) -> bool {
        self.locations.contains_key(id)
    }

    pub fn get_location(&self, id: &Ulid) -> Option<SharedLocationState> {
        self.locations.get(id).map(|e| e.value().clone())
    }

    pub fn insert_location(&self, id: Ulid, state: SharedLocationState) {
        self.locations.insert(id, state);
    }

    pub fn remove_location(&self, id: &Ulid) -> Option<(Ulid, SharedLocationState)> {
        self.locations.remove(id)
    }

    pub fn location_ids(&self) -> Vec<Ulid> {
        self.locations.iter().map(|e| *e.key()).collect()
    }

    // ── Entity indexes ───────────────────────────────────────

    pub fn location_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_to_location
            .get(reservation_id)
            .map(|e| *e.value())
    }

    pub fn map_reservation(&self, reservation_id: Ulid, location_id: Ulid) {
        self.reservation_to_location
            .insert(reservation_id, location_id);
    }

    pub fn unmap_reservation(&self, reservation_id: &Ulid) {
        self.reservation_to_location.remove(reservation_id);
    }

    pub fn location_for_queue_entry(&self, entry_id: &Ulid) -> Option<Ulid> {
        self.queue_to_location.get(entry_id).map(|e| *e.value())
    }

    pub fn map_queue_entry(&self, entry_id: Ulid, location_id: Ulid) {
        self.queue_to_location.insert(entry_id, location_id);
    }

    pub fn unmap_queue_entry(&self, entry_id: &Ulid) {
        self.queue_to_location.remove(entry_id);
    }
}
