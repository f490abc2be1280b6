//! Identity and time sources used to enrich messages.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Produces a fresh, never-reused identifier for each stored message.
pub trait IdentityGenerator: Send + Sync {
    /// Returns the next identifier.
    fn next_id(&self) -> Uuid;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdentityGenerator for UuidGenerator {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Source of creation timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock that never goes backwards.
///
/// If the system clock steps back, the last returned instant is repeated
/// until real time catches up. Timestamps are truncated to milliseconds, the
/// precision they are stored with.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
    /// Creates a new clock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let now = truncate_to_millis(Utc::now());
        // The stored instant stays a valid lower bound even if poisoned.
        let mut last = self
            .last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let next = match *last {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        *last = Some(next);
        next
    }
}

fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value.timestamp_millis()).unwrap_or(value)
}
