use ulid::Ulid;

use crate::model::TimeSpan;
use crate::store::LocationState;

// ── Availability Checks ──────────────────────────────────────────

/// True iff no reservation on the named seat overlaps `span`, optionally
/// excluding one reservation id (the record being edited). Callers hold the
/// location write lock, so the answer stays valid until they commit.
pub fn is_seat_free(
    state: &LocationState,
    seat_name: &str,
    span: &TimeSpan,
    ignore: Option<Ulid>,
) -> bool {
    match state.seat_by_name(seat_name) {
        Some(seat) => first_overlap(state, &seat.id, span, ignore).is_none(),
        None => false,
    }
}

/// The id of some reservation on the seat overlapping `span`, if any.
/// Open/open overlap test: `a.start < b.end && b.start < a.end`.
pub fn first_overlap(
    state: &LocationState,
    seat_id: &Ulid,
    span: &TimeSpan,
    ignore: Option<Ulid>,
) -> Option<Ulid> {
    state
        .reservations_on_seat(seat_id)
        .filter(|r| Some(r.id) != ignore)
        .find(|r| r.span.overlaps(span))
        .map(|r| r.id)
}

/// Seat names with at least one reservation overlapping `span` — used to
/// grey out occupied seats for a requested window.
pub fn busy_seat_names(state: &LocationState, span: &TimeSpan) -> Vec<String> {
    state
        .seats
        .iter()
        .filter(|seat| first_overlap(state, &seat.id, span, None).is_some())
        .map(|seat| seat.name.clone())
        .collect()
}
