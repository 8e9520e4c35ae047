use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    /// Malformed request — nothing was checked against storage yet.
    Invalid(&'static str),
    /// Interval falls outside the location's operating hours.
    OutsideOpenHours,
    /// No seat with that name in the location.
    UnknownSeat(String),
    /// Requested capacity exceeds what the seat holds.
    CapacityExceeded(u32),
    /// The user already holds a reservation in this location on that day.
    DuplicateBooking,
    /// The seat is already reserved somewhere inside the requested window.
    Overlap(Ulid),
    /// The user already has an active queue entry for that day.
    AlreadyQueued,
    /// The reservation's member list is at `people_amount`.
    GroupFull(u32),
    /// The booking's end is already in the past.
    AlreadyEnded,
    AlreadyExists(Ulid),
    NotFound(Ulid),
    Forbidden(&'static str),
    Internal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Invalid(msg) => write!(f, "invalid request: {msg}"),
            EngineError::OutsideOpenHours => {
                write!(f, "interval falls outside the location's operating hours")
            }
            EngineError::UnknownSeat(name) => write!(f, "no seat named {name:?} here"),
            EngineError::CapacityExceeded(max) => {
                write!(f, "seat holds at most {max} occupants")
            }
            EngineError::DuplicateBooking => {
                write!(f, "user already holds a reservation in this location on that day")
            }
            EngineError::Overlap(id) => write!(f, "window overlaps reservation {id}"),
            EngineError::AlreadyQueued => {
                write!(f, "user already has an active queue entry for that day")
            }
            EngineError::GroupFull(max) => write!(f, "reservation already has {max} members"),
            EngineError::AlreadyEnded => write!(f, "booking has already ended"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            EngineError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
