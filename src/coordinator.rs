//! Price refresh cycle
//!
//! Each cycle prunes hours before the start of the local day, works out which
//! hours in the publication window are still unknown, fetches a bounded batch
//! of them concurrently and merges the answers into the cache. The scheduler
//! drains the remaining backlog over later cycles.

use crate::cache::{PriceCache, PricePoint, horizon_end};
use crate::clock::{Clock, start_of_local_day};
use crate::config::Config;
use crate::error::{BarryError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::scheduler::UpdateSource;
use crate::source::PriceSource;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Fetch up to `batch_size` hours from the front of `hours`, concurrently.
///
/// All or nothing: the first failing hour fails the batch and cancels the
/// fetches still in flight.
pub async fn fetch_batch<I>(
    source: Arc<dyn PriceSource>,
    mpid: &str,
    hours: I,
    batch_size: usize,
) -> Result<PriceCache>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut tasks = JoinSet::new();
    for start in hours.into_iter().take(batch_size) {
        let source = source.clone();
        let mpid = mpid.to_string();
        tasks.spawn(async move {
            let price = source
                .fetch_price(start, start + Duration::hours(1), &mpid)
                .await?;
            Ok::<_, BarryError>(PricePoint::new(start, price))
        });
    }

    let mut fetched = PriceCache::new();
    while let Some(joined) = tasks.join_next().await {
        let point = joined
            .map_err(|e| BarryError::generic(format!("Price fetch task failed: {}", e)))??;
        fetched.insert(point);
    }
    Ok(fetched)
}

/// Settings of one refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub mpid: String,
    pub tz: Tz,
    pub refresh_hour: u32,
    pub batch_size: usize,
    pub api_timeout: std::time::Duration,
}

impl RefreshSettings {
    pub fn from_config(config: &Config, mpid: &str) -> Result<Self> {
        Ok(Self {
            mpid: mpid.to_string(),
            tz: config.tz()?,
            refresh_hour: config.refresh_hour,
            batch_size: config.batch_size,
            api_timeout: config.api_timeout(),
        })
    }
}

/// Refresh behaviour for the hourly price cache
pub struct PriceCoordinator {
    source: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
    settings: RefreshSettings,
    logger: StructuredLogger,
}

impl PriceCoordinator {
    pub fn new(
        source: Arc<dyn PriceSource>,
        clock: Arc<dyn Clock>,
        settings: RefreshSettings,
    ) -> Self {
        let logger = get_logger_with_context(
            LogContext::new("coordinator")
                .with_mpid(settings.mpid.clone())
                .with_field("batch_size", settings.batch_size.to_string()),
        );
        Self {
            source,
            clock,
            settings,
            logger,
        }
    }

    pub fn settings(&self) -> &RefreshSettings {
        &self.settings
    }

    /// One cycle without the timeout: prune, select, fetch, merge
    pub async fn refresh_cache(&self, previous: &PriceCache) -> Result<PriceCache> {
        let now = self.clock.now();
        let today_start = start_of_local_day(now, self.settings.tz);
        let pruned = previous.pruned(today_start);
        if pruned.len() < previous.len() {
            self.logger.debug(&format!(
                "Pruned {} price(s) before {}",
                previous.len() - pruned.len(),
                today_start
            ));
        }

        let horizon = horizon_end(now, self.settings.refresh_hour, self.settings.tz);
        let missing = pruned.missing_hours(now, horizon);
        self.logger.debug(&format!(
            "Fetching kWh prices up to {} ({} cached)",
            horizon,
            pruned.len()
        ));

        let fetched = fetch_batch(
            self.source.clone(),
            &self.settings.mpid,
            missing,
            self.settings.batch_size,
        )
        .await?;

        Ok(pruned.merge(&fetched))
    }
}

#[async_trait::async_trait]
impl UpdateSource for PriceCoordinator {
    type Data = PriceCache;

    async fn refresh(&self, previous: Option<Arc<PriceCache>>) -> Result<PriceCache> {
        let previous = previous.map(|p| (*p).clone()).unwrap_or_default();
        let outcome =
            tokio::time::timeout(self.settings.api_timeout, self.refresh_cache(&previous)).await;

        let err = match outcome {
            Ok(Ok(cache)) => {
                self.logger
                    .debug(&format!("Price cache holds {} hour(s)", cache.len()));
                return Ok(cache);
            }
            Ok(Err(e)) => e,
            Err(_) => BarryError::timeout(format!(
                "Refresh exceeded {:?}",
                self.settings.api_timeout
            )),
        };

        // The scheduler reports the failure; this adds the cycle's context
        self.logger.debug(&format!(
            "kWh price refresh failed with {} cached hour(s): {}",
            previous.len(),
            err
        ));
        Err(BarryError::update_failed(err.to_string()))
    }
}
