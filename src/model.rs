use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use ulid::Ulid;

/// External user identity, issued by the auth layer — opaque here.
pub type UserId = i64;

/// Half-open wall-clock interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSpan {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeSpan {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start < end, "TimeSpan start must be before end");
        Self { start, end }
    }

    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }
}

/// A coworking site with operating hours, owned by one admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub id: Ulid,
    pub admin_id: Ulid,
    pub name: String,
    pub address: String,
    /// Opening hour 0–24. The pair (0, 24) means "always open".
    pub open_hour: u32,
    pub close_hour: u32,
}

impl Location {
    pub fn is_always_open(&self) -> bool {
        self.open_hour == 0 && self.close_hour == 24
    }
}

/// A bookable unit within a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub id: Ulid,
    pub location_id: Ulid,
    /// Unique within the owning location.
    pub name: String,
    pub features: Vec<String>,
    pub max_occupants: u32,
}

impl Seat {
    /// Single-occupant seats participate in queue auto-fill.
    pub fn is_single_occupant(&self) -> bool {
        self.max_occupants == 1
    }
}

/// Which lifecycle notifications have already fired. Each flag transitions
/// false→true at most once, independently of the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyFlags {
    pub pre_end: bool,
    pub pre_start: bool,
    pub client_end: bool,
    pub client_start: bool,
}

impl NotifyFlags {
    pub fn all_set(&self) -> bool {
        self.pre_end && self.pre_start && self.client_end && self.client_start
    }
}

/// A booked time interval on a seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: Ulid,
    pub seat_id: Ulid,
    pub span: TimeSpan,
    pub people_amount: u32,
    pub features: Vec<String>,
    pub comment: Option<String>,
    /// 4-digit human-facing access code.
    pub code: String,
    pub flags: NotifyFlags,
}

impl Reservation {
    pub fn new(
        id: Ulid,
        seat_id: Ulid,
        span: TimeSpan,
        people_amount: u32,
        features: Vec<String>,
        comment: Option<String>,
    ) -> Self {
        Self {
            id,
            seat_id,
            span,
            people_amount,
            features,
            comment,
            code: access_code(&id),
            flags: NotifyFlags::default(),
        }
    }

    pub fn starts_on(&self, date: NaiveDate) -> bool {
        self.span.start.date() == date
    }
}

/// Derive the access code from the id's random bits — no extra RNG state.
pub fn access_code(id: &Ulid) -> String {
    format!("{:04}", id.random() % 10_000)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Creator,
    Member,
}

/// Links a reservation to a user. Exactly one Creator per reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationMember {
    pub reservation_id: Ulid,
    pub user_id: UserId,
    pub role: MemberRole,
}

/// A standing request to be auto-assigned a single-occupant seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: Ulid,
    pub location_id: Ulid,
    pub user_id: UserId,
    /// Concrete start wish, or None = "earliest available hour onward".
    pub date: Option<NaiveDateTime>,
    pub hours: u32,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Who is performing a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(UserId),
    Admin,
}

// ── Live event payload ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BookingCreated,
    BookingUpdated,
    BookingCanceled,
    BookingStarted,
}

/// Wire payload pushed to live subscribers and the private channel.
/// `table_id` is the historical field name; it carries the seat name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveEvent {
    pub event: EventKind,
    pub table_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
}

impl LiveEvent {
    fn with_span(event: EventKind, seat_name: &str, span: &TimeSpan) -> Self {
        Self {
            event,
            table_id: seat_name.to_string(),
            time_start: Some(span.start.to_string()),
            time_end: Some(span.end.to_string()),
        }
    }

    pub fn booking_created(seat_name: &str, span: &TimeSpan) -> Self {
        Self::with_span(EventKind::BookingCreated, seat_name, span)
    }

    pub fn booking_updated(seat_name: &str, span: &TimeSpan) -> Self {
        Self::with_span(EventKind::BookingUpdated, seat_name, span)
    }

    pub fn booking_canceled(seat_name: &str, span: &TimeSpan) -> Self {
        Self::with_span(EventKind::BookingCanceled, seat_name, span)
    }

    pub fn booking_started(seat_name: &str, span: &TimeSpan) -> Self {
        Self::with_span(EventKind::BookingStarted, seat_name, span)
    }
}
