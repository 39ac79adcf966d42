//! kWh price sensor
//!
//! Renders the price cache the way a home-automation entity shows it: the
//! current hour's price as state, and today's and tomorrow's prices keyed by
//! local hour as attributes.

use crate::cache::PriceCache;
use crate::clock::start_of_local_day_offset;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;

pub const INFO_TYPE: &str = "kWh_prices";
pub const ATTRIBUTION: &str = "Barry";
const NAME: &str = "Barry";
const SENSOR_NAME: &str = "kWh total price";
const ICON: &str = "mdi:currency-eur";
const DEVICE_CLASS: &str = "monetary";
const UNKNOWN_STATE: &str = "unknown";

/// Which local day an attribute map covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Day {
    Today,
    Tomorrow,
}

/// Extra state attributes of the sensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorAttributes {
    /// Local hour of day -> price
    pub today: BTreeMap<u32, f64>,
    pub tomorrow: BTreeMap<u32, f64>,
    /// Rank of the current price among today's prices, cheapest first
    pub current_frame: Option<usize>,
    pub attribution: &'static str,
}

/// Everything a consumer needs to show the sensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorView {
    pub name: String,
    pub unique_id: String,
    pub device_name: String,
    /// Current price, or "unknown"
    pub state: String,
    pub native_value: Option<f64>,
    pub unit_of_measurement: String,
    pub icon: &'static str,
    pub device_class: &'static str,
    pub attributes: SensorAttributes,
}

/// Position of `current` in `prices` sorted ascending
pub fn price_rank(prices: &[f64], current: f64) -> Option<usize> {
    let mut sorted = prices.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.iter().position(|v| v.total_cmp(&current).is_eq())
}

pub struct PriceSensor {
    mpid: String,
    currency: String,
    tz: Tz,
    logger: StructuredLogger,
}

impl PriceSensor {
    pub fn new(mpid: &str, currency: &str, tz: Tz) -> Self {
        Self {
            mpid: mpid.to_string(),
            currency: currency.to_string(),
            tz,
            logger: get_logger_with_context(
                LogContext::new("sensor").with_mpid(mpid.to_string()),
            ),
        }
    }

    fn short_mpid(&self) -> String {
        self.mpid.chars().take(5).collect()
    }

    pub fn name(&self) -> String {
        format!("{} {}", NAME, SENSOR_NAME)
    }

    pub fn unique_id(&self) -> String {
        format!("barry_{}_{}", self.short_mpid(), INFO_TYPE)
    }

    pub fn device_name(&self) -> String {
        format!("{} - {}", NAME, self.short_mpid())
    }

    pub fn unit_of_measurement(&self) -> String {
        format!("{}/kWh", self.currency)
    }

    /// Price of the hour containing `now`
    pub fn current_value(&self, cache: &PriceCache, now: DateTime<Utc>) -> Option<f64> {
        cache.get(now).map(|p| p.price)
    }

    pub fn state(&self, cache: &PriceCache, now: DateTime<Utc>) -> String {
        self.current_value(cache, now)
            .map_or_else(|| UNKNOWN_STATE.to_string(), |v| v.to_string())
    }

    /// `[start, end)` of a local day; 23 or 25 hours long on DST days
    fn day_window(&self, now: DateTime<Utc>, day: Day) -> (DateTime<Utc>, DateTime<Utc>) {
        let offset = match day {
            Day::Today => 0,
            Day::Tomorrow => 1,
        };
        (
            start_of_local_day_offset(now, self.tz, offset),
            start_of_local_day_offset(now, self.tz, offset + 1),
        )
    }

    /// Prices of one local day keyed by local hour of day.
    ///
    /// The hour repeated when clocks go back keeps its later price.
    pub fn day_prices(&self, cache: &PriceCache, now: DateTime<Utc>, day: Day) -> BTreeMap<u32, f64> {
        let (start, end) = self.day_window(now, day);
        cache
            .range(start, end)
            .map(|p| (p.start.with_timezone(&self.tz).hour(), p.price))
            .collect()
    }

    /// 0-based rank of the current price among all of today's prices, cheapest first
    pub fn current_frame(&self, cache: &PriceCache, now: DateTime<Utc>) -> Option<usize> {
        let Some(current) = self.current_value(cache, now) else {
            self.logger
                .warn(&format!("Missing current value in {} at {}", INFO_TYPE, now));
            return None;
        };
        let (start, end) = self.day_window(now, Day::Today);
        self.rank_current(current, cache.range(start, end).map(|p| p.price).collect())
    }

    fn rank_current(&self, current: f64, today: Vec<f64>) -> Option<usize> {
        let frame = price_rank(&today, current);
        if frame.is_none() {
            self.logger.warn(&format!(
                "Current value {} not found among today's {} prices",
                current,
                today.len()
            ));
        }
        frame
    }

    pub fn attributes(&self, cache: &PriceCache, now: DateTime<Utc>) -> SensorAttributes {
        SensorAttributes {
            today: self.day_prices(cache, now, Day::Today),
            tomorrow: self.day_prices(cache, now, Day::Tomorrow),
            current_frame: self.current_frame(cache, now),
            attribution: ATTRIBUTION,
        }
    }

    pub fn render(&self, cache: &PriceCache, now: DateTime<Utc>) -> SensorView {
        let native_value = self.current_value(cache, now);
        SensorView {
            name: self.name(),
            unique_id: self.unique_id(),
            device_name: self.device_name(),
            state: self.state(cache, now),
            native_value,
            unit_of_measurement: self.unit_of_measurement(),
            icon: ICON,
            device_class: DEVICE_CLASS,
            attributes: self.attributes(cache, now),
        }
    }
}
