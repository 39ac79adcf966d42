//! Time source and local-day helpers
//!
//! Price hours are keyed in UTC, but day boundaries (pruning, the publication
//! horizon, the sensor's day attributes) follow the configured local time zone.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant, for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Truncate an instant to the start of its UTC hour
pub fn truncate_to_hour(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// Midnight of a local calendar date, as a UTC instant
///
/// Zones that skip midnight on a DST change start the day at the first
/// existing local time after it.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    for shift in 0..=2 {
        match tz.from_local_datetime(&(midnight + Duration::hours(shift))) {
            LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => {
                return t.with_timezone(&Utc);
            }
            LocalResult::None => {}
        }
    }
    Utc.from_utc_datetime(&midnight)
}

/// Start of the local day containing `now`
pub fn start_of_local_day(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    local_midnight(now.with_timezone(&tz).date_naive(), tz)
}

/// Start of the local day `days` calendar days after the one containing `now`
pub fn start_of_local_day_offset(now: DateTime<Utc>, tz: Tz, days: i64) -> DateTime<Utc> {
    let date = now.with_timezone(&tz).date_naive() + Duration::days(days);
    local_midnight(date, tz)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn truncates_to_hour() {
        assert_eq!(
            truncate_to_hour(utc("2024-01-01T10:59:59.999Z")),
            utc("2024-01-01T10:00:00Z")
        );
    }

    #[test]
    fn local_day_start_in_copenhagen() {
        let tz = chrono_tz::Europe::Copenhagen;
        // 23:30 UTC on Jan 1st is already Jan 2nd in Copenhagen (UTC+1)
        let now = utc("2024-01-01T23:30:00Z");
        assert_eq!(start_of_local_day(now, tz), utc("2024-01-01T23:00:00Z"));
        assert_eq!(
            start_of_local_day_offset(now, tz, 1),
            utc("2024-01-02T23:00:00Z")
        );
    }

    #[test]
    fn local_day_start_across_dst() {
        let tz = chrono_tz::Europe::Copenhagen;
        // Clocks go forward on 2024-03-31; the next midnight is UTC+2
        let now = utc("2024-03-30T12:00:00Z");
        assert_eq!(start_of_local_day(now, tz), utc("2024-03-29T23:00:00Z"));
        assert_eq!(
            start_of_local_day_offset(now, tz, 2),
            utc("2024-03-31T22:00:00Z")
        );
    }

    #[test]
    fn fixed_clock_moves_only_when_told() {
        let clock = FixedClock::new(utc("2024-01-01T10:00:00Z"));
        assert_eq!(clock.now(), utc("2024-01-01T10:00:00Z"));
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now(), utc("2024-01-01T12:00:00Z"));
        clock.set(utc("2024-02-01T00:00:00Z"));
        assert_eq!(clock.now(), utc("2024-02-01T00:00:00Z"));
    }
}
