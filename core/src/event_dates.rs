//! Event date resolution — which calendar days a generation run must cover.
//!
//! A run covers every day from the day after the checkpoint (or the earliest
//! recorded event when there is no usable checkpoint) through today.
//! When that leaves nothing to do, the run still covers today: a run never
//! processes zero dates.

use crate::{
    error::{TallyError, TallyResult},
    repository::ReportRepository,
    types::DATE_KEY_FORMAT,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// A calendar day plus the instant the run associates with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateKey {
    key:     String,
    day:     NaiveDate,
    instant: DateTime<Utc>,
}

impl DateKey {
    pub fn new(day: NaiveDate, instant: DateTime<Utc>) -> Self {
        Self {
            key: day.format(DATE_KEY_FORMAT).to_string(),
            day,
            instant,
        }
    }

    /// Key for `day` anchored at midnight UTC.
    pub fn start_of(day: NaiveDate) -> Self {
        Self::new(day, day.and_time(NaiveTime::MIN).and_utc())
    }

    /// ISO `YYYY-MM-DD` form.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }
}

/// Strictly increasing, duplicate-free sequence of date keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    dates: Vec<DateKey>,
}

impl DateRange {
    /// Returns `None` unless `dates` is non-empty and strictly increasing by day.
    pub fn new(dates: Vec<DateKey>) -> Option<Self> {
        if dates.is_empty() || dates.windows(2).any(|w| w[0].day >= w[1].day) {
            return None;
        }
        Some(Self { dates })
    }

    /// The single-entry range used when nothing else needs processing.
    pub fn single(now: DateTime<Utc>) -> Self {
        Self { dates: vec![DateKey::new(now.date_naive(), now)] }
    }

    /// Every day in `start..=now`'s day. Today carries `now` as its instant.
    fn span(start: NaiveDate, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let dates: Vec<DateKey> = start
            .iter_days()
            .take_while(|d| *d <= today)
            .map(|d| if d == today { DateKey::new(d, now) } else { DateKey::start_of(d) })
            .collect();
        if dates.is_empty() {
            Self::single(now)
        } else {
            Self { dates }
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DateKey> {
        self.dates.iter()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first(&self) -> &DateKey {
        &self.dates[0]
    }

    pub fn last(&self) -> &DateKey {
        &self.dates[self.dates.len() - 1]
    }

    pub fn keys(&self) -> Vec<String> {
        self.dates.iter().map(|d| d.key.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a DateRange {
    type Item = &'a DateKey;
    type IntoIter = std::slice::Iter<'a, DateKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.dates.iter()
    }
}

/// Parse a checkpoint or as-of value: `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_day(input: &str) -> TallyResult<NaiveDate> {
    let trimmed = input.trim();
    match NaiveDate::parse_from_str(trimmed, DATE_KEY_FORMAT) {
        Ok(day) => Ok(day),
        Err(source) => DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| dt.with_timezone(&Utc).date_naive())
            .map_err(|_| TallyError::DateParse {
                input: input.to_string(),
                source,
            }),
    }
}

/// Event dates may carry a time component (`2019-01-01 08:30:00`); only the day matters.
fn parse_event_day(input: &str) -> TallyResult<NaiveDate> {
    parse_day(input).or_else(|e| match input.trim().get(..10) {
        Some(prefix) => parse_day(prefix),
        None => Err(e),
    })
}

pub struct EventDateResolver<'a, R: ReportRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: ReportRepository + ?Sized> EventDateResolver<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Resolve the days to process. Never returns an empty range.
    ///
    /// A malformed checkpoint is logged and treated as absent.
    pub fn resolve(&self, checkpoint: Option<&str>, now: DateTime<Utc>) -> TallyResult<DateRange> {
        let start = match checkpoint.map(parse_day) {
            Some(Ok(last)) => last.succ_opt(),
            Some(Err(e)) => {
                log::warn!("event dates: ignoring checkpoint: {e}");
                self.earliest_event_day()?
            }
            None => self.earliest_event_day()?,
        };

        let range = match start {
            Some(start) if start <= now.date_naive() => DateRange::span(start, now),
            _ => DateRange::single(now),
        };
        log::debug!(
            "event dates: {} day(s) from {} to {}",
            range.len(),
            range.first().key(),
            range.last().key()
        );
        Ok(range)
    }

    fn earliest_event_day(&self) -> TallyResult<Option<NaiveDate>> {
        let Some(raw) = self.repo.earliest_event_date()? else {
            return Ok(None);
        };
        match parse_event_day(&raw) {
            Ok(day) => Ok(Some(day)),
            Err(e) => {
                log::warn!("event dates: ignoring earliest event date: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_KEY_FORMAT).unwrap()
    }

    #[test]
    fn parse_day_accepts_iso_dates_and_timestamps() {
        assert_eq!(parse_day("2019-12-11").unwrap(), day("2019-12-11"));
        assert_eq!(parse_day("2019-12-11T23:15:00Z").unwrap(), day("2019-12-11"));
        assert!(matches!(parse_day("11/12/2019"), Err(TallyError::DateParse { .. })));
    }

    #[test]
    fn event_day_ignores_time_component() {
        assert_eq!(parse_event_day("2019-07-01 08:30:00").unwrap(), day("2019-07-01"));
    }

    #[test]
    fn range_rejects_unordered_or_duplicate_days() {
        let a = DateKey::start_of(day("2019-01-01"));
        let b = DateKey::start_of(day("2019-01-02"));
        assert!(DateRange::new(vec![a.clone(), b.clone()]).is_some());
        assert!(DateRange::new(vec![b.clone(), a.clone()]).is_none());
        assert!(DateRange::new(vec![a.clone(), a]).is_none());
        assert!(DateRange::new(Vec::new()).is_none());
    }
}
