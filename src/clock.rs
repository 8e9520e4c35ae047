use chrono::{Duration, FixedOffset, NaiveDateTime, Timelike, Utc};

/// Process-wide wall clock pinned to one configured UTC offset. Every "now"
/// comparison in the engine goes through a Clock, and reservation hours are
/// compared as local wall-clock hours of day.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    offset: FixedOffset,
}

impl Clock {
    pub fn utc() -> Self {
        Self {
            offset: FixedOffset::east_opt(0).unwrap(),
        }
    }

    /// Offset east of UTC in seconds; None if out of range (±24h exclusive).
    pub fn fixed_offset(secs_east: i32) -> Option<Self> {
        FixedOffset::east_opt(secs_east).map(|offset| Self { offset })
    }

    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }

    /// Now floored to the hour — queue anchoring works on whole hours.
    pub fn now_on_the_hour(&self) -> NaiveDateTime {
        on_the_hour(self.now())
    }
}

pub fn on_the_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.with_minute(0)
        .unwrap()
        .with_second(0)
        .unwrap()
        .with_nanosecond(0)
        .unwrap()
}

/// The next full hour after `t` — the earliest start an open queue request
/// can ask for.
pub fn next_full_hour(t: NaiveDateTime) -> NaiveDateTime {
    on_the_hour(t) + Duration::hours(1)
}
