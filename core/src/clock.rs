//! Wall clock used to decide which day "today" is.
//!
//! The generator never calls `Utc::now()` itself; it asks its Clock.
//! Tests pin the clock with FixedClock so date ranges are reproducible.

use crate::error::{TallyError, TallyResult};
use chrono::{DateTime, Utc};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Parse an RFC 3339 instant, e.g. `"2019-01-03T10:00:00Z"`.
    pub fn at(rfc3339: &str) -> TallyResult<Self> {
        let instant = DateTime::parse_from_rfc3339(rfc3339).map_err(|source| {
            TallyError::DateParse {
                input: rfc3339.to_string(),
                source,
            }
        })?;
        Ok(Self(instant.with_timezone(&Utc)))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
