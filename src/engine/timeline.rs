use chrono::{Days, NaiveDate, Timelike};
use ulid::Ulid;

use crate::model::Seat;
use crate::store::LocationState;

pub const HOURS_PER_DAY: usize = 24;

/// One-day (24 slots) or two-consecutive-day (48 slots) occupancy window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineWindow {
    OneDay,
    TwoDays,
}

impl TimelineWindow {
    pub fn days(self) -> usize {
        match self {
            TimelineWindow::OneDay => 1,
            TimelineWindow::TwoDays => 2,
        }
    }

    pub fn slots(self) -> usize {
        self.days() * HOURS_PER_DAY
    }
}

/// Hourly occupancy bitmap for one seat: slot `24*day_offset + h` is 1 when a
/// reservation starting on `date + day_offset` covers hour `h` of that day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatTimeline {
    pub seat_id: Ulid,
    pub seat_name: String,
    pub slots: Vec<u8>,
}

/// Build the bitmap for a single seat, optionally excluding one reservation
/// (used to re-validate an edit against everything but the edited record).
/// Purely derived from current state — no side effects.
pub fn seat_timeline(
    state: &LocationState,
    seat_name: &str,
    date: NaiveDate,
    window: TimelineWindow,
    ignore: Option<Ulid>,
) -> Option<Vec<u8>> {
    let seat = state.seat_by_name(seat_name)?;
    Some(build_slots(state, seat, date, window, ignore))
}

/// Bitmaps for every seat in the location (or only the single-occupant ones,
/// which is what the queue matcher scans).
pub fn location_timelines(
    state: &LocationState,
    date: NaiveDate,
    window: TimelineWindow,
    single_occupant_only: bool,
    ignore: Option<Ulid>,
) -> Vec<SeatTimeline> {
    state
        .seats
        .iter()
        .filter(|s| !single_occupant_only || s.is_single_occupant())
        .map(|s| SeatTimeline {
            seat_id: s.id,
            seat_name: s.name.clone(),
            slots: build_slots(state, s, date, window, ignore),
        })
        .collect()
}

fn build_slots(
    state: &LocationState,
    seat: &Seat,
    date: NaiveDate,
    window: TimelineWindow,
    ignore: Option<Ulid>,
) -> Vec<u8> {
    let mut slots = vec![0u8; window.slots()];
    for day_offset in 0..window.days() {
        let day = date + Days::new(day_offset as u64);
        for reservation in state.reservations_on_seat(&seat.id) {
            if Some(reservation.id) == ignore || !reservation.starts_on(day) {
                continue;
            }
            let from = reservation.span.start.hour() as usize;
            let to = reservation.span.end.hour() as usize;
            for hour in from..to {
                slots[HOURS_PER_DAY * day_offset + hour] = 1;
            }
        }
    }
    slots
}

/// Longest run of consecutive free slots, with the start index of its first
/// occurrence. An all-free window counts in full.
pub fn longest_free_run(slots: &[u8]) -> (usize, usize) {
    let mut best_len = 0;
    let mut best_start = 0;
    let mut run_len = 0;
    let mut run_start = 0;

    for (i, &slot) in slots.iter().enumerate() {
        if slot == 0 {
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
            if run_len > best_len {
                best_len = run_len;
                best_start = run_start;
            }
        } else {
            run_len = 0;
        }
    }

    (best_len, best_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::NaiveDateTime;

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn state_with_seats(names: &[&str]) -> LocationState {
        let location = Location {
            id: Ulid::new(),
            admin_id: Ulid::new(),
            name: "hub".into(),
            address: "main st".into(),
            open_hour: 0,
            close_hour: 24,
        };
        let location_id = location.id;
        let mut state = LocationState::new(location);
        for name in names {
            state.seats.push(Seat {
                id: Ulid::new(),
                location_id,
                name: (*name).into(),
                features: vec![],
                max_occupants: 1,
            });
        }
        state
    }

    fn book(state: &mut LocationState, seat_name: &str, start: NaiveDateTime, end: NaiveDateTime) -> Ulid {
        let seat_id = state.seat_by_name(seat_name).unwrap().id;
        let reservation = Reservation::new(
            Ulid::new(),
            seat_id,
            TimeSpan::new(start, end),
            1,
            vec![],
            None,
        );
        let id = reservation.id;
        state.insert_reservation(reservation, 1);
        id
    }

    #[test]
    fn bitmap_marks_covered_hours() {
        let mut state = state_with_seats(&["w-1"]);
        book(&mut state, "w-1", dt(1, 9), dt(1, 11));
        book(&mut state, "w-1", dt(1, 14), dt(1, 16));

        let slots =
            seat_timeline(&state, "w-1", dt(1, 0).date(), TimelineWindow::OneDay, None).unwrap();
        assert_eq!(slots.len(), 24);
        for (h, &slot) in slots.iter().enumerate() {
            let expect = matches!(h, 9 | 10 | 14 | 15);
            assert_eq!(slot == 1, expect, "hour {h}");
        }
    }

    #[test]
    fn two_day_window_offsets_next_day() {
        let mut state = state_with_seats(&["w-1"]);
        book(&mut state, "w-1", dt(1, 22), dt(1, 23));
        book(&mut state, "w-1", dt(2, 8), dt(2, 10));

        let slots =
            seat_timeline(&state, "w-1", dt(1, 0).date(), TimelineWindow::TwoDays, None).unwrap();
        assert_eq!(slots.len(), 48);
        assert_eq!(slots[22], 1);
        assert_eq!(slots[24 + 8], 1);
        assert_eq!(slots[24 + 9], 1);
        assert_eq!(slots[24 + 10], 0);
    }

    #[test]
    fn ignore_excludes_one_reservation() {
        let mut state = state_with_seats(&["w-1"]);
        let id = book(&mut state, "w-1", dt(1, 9), dt(1, 11));

        let slots =
            seat_timeline(&state, "w-1", dt(1, 0).date(), TimelineWindow::OneDay, Some(id))
                .unwrap();
        assert!(slots.iter().all(|&s| s == 0));
    }

    #[test]
    fn unknown_seat_is_none() {
        let state = state_with_seats(&["w-1"]);
        assert!(seat_timeline(&state, "w-9", dt(1, 0).date(), TimelineWindow::OneDay, None)
            .is_none());
    }

    #[test]
    fn location_timelines_filter_single_occupant() {
        let mut state = state_with_seats(&["w-1", "w-2"]);
        state.seats.push(Seat {
            id: Ulid::new(),
            location_id: state.location.id,
            name: "group-room".into(),
            features: vec![],
            max_occupants: 6,
        });

        let all = location_timelines(&state, dt(1, 0).date(), TimelineWindow::OneDay, false, None);
        assert_eq!(all.len(), 3);

        let singles =
            location_timelines(&state, dt(1, 0).date(), TimelineWindow::OneDay, true, None);
        assert_eq!(singles.len(), 2);
        assert!(singles.iter().all(|t| t.seat_name.starts_with("w-")));
    }

    // ── longest_free_run ─────────────────────────────────────

    #[test]
    fn free_run_all_free() {
        assert_eq!(longest_free_run(&[0; 24]), (24, 0));
    }

    #[test]
    fn free_run_all_occupied() {
        assert_eq!(longest_free_run(&[1; 8]).0, 0);
    }

    #[test]
    fn free_run_bounded_by_edges() {
        //            0  1  2  3  4  5  6  7
        let slots = [0, 1, 0, 0, 0, 1, 0, 0];
        assert_eq!(longest_free_run(&slots), (3, 2));
    }

    #[test]
    fn free_run_first_occurrence_wins_ties() {
        let slots = [0, 0, 1, 0, 0];
        assert_eq!(longest_free_run(&slots), (2, 0));
    }

    #[test]
    fn free_run_empty_slice() {
        assert_eq!(longest_free_run(&[]), (0, 0));
    }
}
