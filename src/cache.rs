//! Hour-keyed price cache
//!
//! Prices are published per hour. The cache remembers every hour already
//! fetched so a refresh only asks the API for what is still missing in the
//! look-ahead window, and merges the answers back in.

use crate::clock::{start_of_local_day_offset, truncate_to_hour};
use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Price of one hour in currency/kWh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Start of the hour, UTC
    pub start: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    /// `start` is truncated to its hour
    pub fn new(start: DateTime<Utc>, price: f64) -> Self {
        Self {
            start: truncate_to_hour(start),
            price,
        }
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::hours(1)
    }
}

/// Mapping from hour-aligned UTC instants to prices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceCache {
    prices: BTreeMap<DateTime<Utc>, PricePoint>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the price for the point's hour
    pub fn insert(&mut self, point: PricePoint) {
        self.prices.insert(point.start, point);
    }

    /// Price point for the hour containing `at`
    pub fn get(&self, at: DateTime<Utc>) -> Option<&PricePoint> {
        self.prices.get(&truncate_to_hour(at))
    }

    pub fn contains_hour(&self, at: DateTime<Utc>) -> bool {
        self.prices.contains_key(&truncate_to_hour(at))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Points in ascending hour order
    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.prices.values()
    }

    /// Points with `from <= start < to`, ascending
    pub fn range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Iterator<Item = &PricePoint> {
        let upper = if to < from { from } else { to };
        self.prices.range(from..upper).map(|(_, p)| p)
    }

    /// Copy holding only entries at or after `today_start`
    pub fn pruned(&self, today_start: DateTime<Utc>) -> PriceCache {
        PriceCache {
            prices: self
                .prices
                .range(today_start..)
                .map(|(k, v)| (*k, *v))
                .collect(),
        }
    }

    /// Union of `self` and `fetched`; `fetched` wins on the same hour
    pub fn merge(&self, fetched: &PriceCache) -> PriceCache {
        let mut prices = self.prices.clone();
        prices.extend(fetched.prices.iter().map(|(k, v)| (*k, *v)));
        PriceCache { prices }
    }

    /// Hours to fetch for the window ending (exclusively) at `horizon_end`
    pub fn missing_hours(
        &self,
        now: DateTime<Utc>,
        horizon_end: DateTime<Utc>,
    ) -> MissingHours<'_> {
        let current = truncate_to_hour(now);
        MissingHours {
            cache: self,
            current,
            next: current + Duration::hours(1),
            end: horizon_end,
            current_pending: true,
        }
    }
}

impl FromIterator<PricePoint> for PriceCache {
    fn from_iter<I: IntoIterator<Item = PricePoint>>(iter: I) -> Self {
        let mut cache = PriceCache::new();
        for point in iter {
            cache.insert(point);
        }
        cache
    }
}

impl<'a> IntoIterator for &'a PriceCache {
    type Item = &'a PricePoint;
    type IntoIter = btree_map::Values<'a, DateTime<Utc>, PricePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.prices.values()
    }
}

/// Lazy sequence of hour starts still to fetch.
///
/// The current hour always comes first, cached or not, so the current price
/// gets refreshed before anything else. After it come the uncached hours in
/// ascending order up to the horizon. Clone it to restart.
#[derive(Debug, Clone)]
pub struct MissingHours<'a> {
    cache: &'a PriceCache,
    current: DateTime<Utc>,
    next: DateTime<Utc>,
    end: DateTime<Utc>,
    current_pending: bool,
}

impl Iterator for MissingHours<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_pending {
            self.current_pending = false;
            return Some(self.current);
        }
        while self.next < self.end {
            let hour = self.next;
            self.next += Duration::hours(1);
            if !self.cache.prices.contains_key(&hour) {
                return Some(hour);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.next < self.end {
            usize::try_from((self.end - self.next).num_hours()).unwrap_or(0) + 1
        } else {
            0
        };
        let lower = usize::from(self.current_pending);
        (lower, Some(remaining + lower))
    }
}

/// End of the fetch window.
///
/// Tomorrow's prices are assumed published from `refresh_hour` local time on;
/// before that the window ends at local midnight tonight, after it a day later.
pub fn horizon_end(now: DateTime<Utc>, refresh_hour: u32, tz: Tz) -> DateTime<Utc> {
    let local_hour = now.with_timezone(&tz).hour();
    let days = if local_hour >= refresh_hour { 2 } else { 1 };
    start_of_local_day_offset(now, tz, days)
}
