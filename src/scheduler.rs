//! Periodic, single-flight update scheduling
//!
//! An [`UpdateCoordinator`] calls an [`UpdateSource`] on a fixed interval and
//! publishes the result through a `watch` channel. A failed refresh never
//! replaces the last good data: readers keep seeing it, flagged as stale,
//! until a later refresh succeeds.

use crate::error::{BarryError, Result};
use crate::logging::{StructuredLogger, get_logger};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::{MissedTickBehavior, interval};

/// Something that can produce a fresh value from the previous one
#[async_trait::async_trait]
pub trait UpdateSource: Send + Sync {
    type Data: Send + Sync + 'static;

    async fn refresh(&self, previous: Option<Arc<Self::Data>>) -> Result<Self::Data>;
}

/// Snapshot published after every refresh attempt
#[derive(Debug)]
pub struct UpdateState<T> {
    /// Last successfully refreshed data
    pub data: Option<Arc<T>>,
    pub last_update_success: bool,
    pub last_error: Option<String>,
    /// Time of the last successful refresh
    pub last_refresh: Option<DateTime<Utc>>,
    pub success_count: u64,
    pub failure_count: u64,
}

impl<T> Default for UpdateState<T> {
    fn default() -> Self {
        Self {
            data: None,
            last_update_success: false,
            last_error: None,
            last_refresh: None,
            success_count: 0,
            failure_count: 0,
        }
    }
}

impl<T> Clone for UpdateState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            last_update_success: self.last_update_success,
            last_error: self.last_error.clone(),
            last_refresh: self.last_refresh,
            success_count: self.success_count,
            failure_count: self.failure_count,
        }
    }
}

pub struct UpdateCoordinator<T> {
    name: String,
    update_interval: Duration,
    state_tx: watch::Sender<Arc<UpdateState<T>>>,
    // Held for the whole refresh so two refreshes never overlap
    refresh_lock: Mutex<()>,
    logger: StructuredLogger,
}

impl<T: Send + Sync + 'static> UpdateCoordinator<T> {
    pub fn new(name: &str, update_interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(Arc::new(UpdateState::default()));
        Self {
            name: name.to_string(),
            update_interval,
            state_tx,
            refresh_lock: Mutex::new(()),
            logger: get_logger("scheduler"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Receiver for published snapshots
    pub fn subscribe(&self) -> watch::Receiver<Arc<UpdateState<T>>> {
        self.state_tx.subscribe()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<UpdateState<T>> {
        self.state_tx.borrow().clone()
    }

    /// Last good data, if any refresh ever succeeded
    pub fn data(&self) -> Option<Arc<T>> {
        self.state_tx.borrow().data.clone()
    }

    /// Run one refresh now, waiting for any refresh already in flight
    pub async fn refresh<S>(&self, source: &S) -> Result<Arc<T>>
    where
        S: UpdateSource<Data = T> + ?Sized,
    {
        let _guard = self.refresh_lock.lock().await;
        let previous = self.data();

        match source.refresh(previous).await {
            Ok(data) => {
                let data = Arc::new(data);
                let prev = self.snapshot();
                self.state_tx.send_replace(Arc::new(UpdateState {
                    data: Some(data.clone()),
                    last_update_success: true,
                    last_error: None,
                    last_refresh: Some(Utc::now()),
                    success_count: prev.success_count + 1,
                    failure_count: prev.failure_count,
                }));
                if !prev.last_update_success && prev.failure_count > 0 {
                    self.logger
                        .info(&format!("{} recovered after failed refresh", self.name));
                }
                Ok(data)
            }
            Err(e) => {
                let prev = self.snapshot();
                self.state_tx.send_replace(Arc::new(UpdateState {
                    data: prev.data.clone(),
                    last_update_success: false,
                    last_error: Some(e.to_string()),
                    last_refresh: prev.last_refresh,
                    success_count: prev.success_count,
                    failure_count: prev.failure_count + 1,
                }));
                self.logger
                    .error(&format!("Error fetching {} data: {}", self.name, e));
                Err(match e {
                    BarryError::UpdateFailed { .. } => e,
                    other => BarryError::update_failed(other.to_string()),
                })
            }
        }
    }

    /// First refresh at startup; a failure means the data is not ready yet
    pub async fn first_refresh<S>(&self, source: &S) -> Result<Arc<T>>
    where
        S: UpdateSource<Data = T> + ?Sized,
    {
        self.refresh(source).await.map_err(|e| {
            BarryError::update_failed(format!("{} not ready: {}", self.name, e))
        })
    }

    /// Refresh on every interval tick until `shutdown` turns true.
    ///
    /// The first tick fires one interval from now; call `first_refresh`
    /// beforehand for an immediate load.
    pub async fn run<S>(&self, source: Arc<S>, mut shutdown: watch::Receiver<bool>)
    where
        S: UpdateSource<Data = T> + ?Sized,
    {
        self.logger.info(&format!(
            "Starting {} refresh loop every {:?}",
            self.name, self.update_interval
        ));

        let mut ticker = interval(self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Errors are already recorded in the snapshot and logged
                    let _ = self.refresh(source.as_ref()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.logger
            .info(&format!("{} refresh loop stopped", self.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counter {
        calls: AtomicU32,
        fail_on: Option<u32>,
    }

    #[async_trait::async_trait]
    impl UpdateSource for Counter {
        type Data = u32;

        async fn refresh(&self, previous: Option<Arc<u32>>) -> Result<u32> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(n) {
                return Err(BarryError::network("boom"));
            }
            Ok(previous.map(|p| *p).unwrap_or(0) + 10)
        }
    }

    #[tokio::test]
    async fn failure_keeps_last_good_data() {
        let coordinator = UpdateCoordinator::new("counter", Duration::from_secs(60));
        let source = Counter {
            calls: AtomicU32::new(0),
            fail_on: Some(2),
        };

        assert_eq!(*coordinator.first_refresh(&source).await.unwrap(), 10);

        let err = coordinator.refresh(&source).await.unwrap_err();
        assert!(matches!(err, BarryError::UpdateFailed { .. }));
        let snap = coordinator.snapshot();
        assert!(!snap.last_update_success);
        assert_eq!(snap.data.as_deref(), Some(&10));
        assert_eq!(snap.failure_count, 1);
        assert!(snap.last_error.as_deref().unwrap_or("").contains("boom"));

        assert_eq!(*coordinator.refresh(&source).await.unwrap(), 20);
        let snap = coordinator.snapshot();
        assert!(snap.last_update_success);
        assert_eq!(snap.success_count, 2);
        assert!(snap.last_error.is_none());
    }

    #[tokio::test]
    async fn first_refresh_failure_is_not_ready() {
        let coordinator = UpdateCoordinator::new("counter", Duration::from_secs(60));
        let source = Counter {
            calls: AtomicU32::new(0),
            fail_on: Some(1),
        };
        let err = coordinator.first_refresh(&source).await.unwrap_err();
        assert!(err.to_string().contains("not ready"));
        assert!(coordinator.data().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn run_refreshes_on_interval_until_shutdown() {
        let coordinator = Arc::new(UpdateCoordinator::new("counter", Duration::from_secs(300)));
        let source = Arc::new(Counter {
            calls: AtomicU32::new(0),
            fail_on: None,
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut updates = coordinator.subscribe();

        let runner = {
            let coordinator = coordinator.clone();
            let source = source.clone();
            tokio::spawn(async move { coordinator.run(source, shutdown_rx).await })
        };

        updates.changed().await.unwrap();
        assert_eq!(coordinator.data().as_deref(), Some(&10));
        updates.changed().await.unwrap();
        assert_eq!(coordinator.data().as_deref(), Some(&20));

        shutdown_tx.send(true).unwrap();
        runner.await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
