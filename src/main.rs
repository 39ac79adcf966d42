use anyhow::Result;
use barry_price::barry::BarryClient;
use barry_price::clock::{Clock, SystemClock};
use barry_price::config::Config;
use barry_price::coordinator::{PriceCoordinator, RefreshSettings};
use barry_price::persistence::EntryStore;
use barry_price::scheduler::UpdateCoordinator;
use barry_price::sensor::PriceSensor;
use barry_price::setup::{EntryData, SetupFlow, SetupStep, reusable_entry};
use barry_price::source::PriceSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Reuse the stored entry, or discover the metering point and store it
async fn resolve_entry(config: &Config, store: &EntryStore) -> Result<EntryData> {
    let preferred = Some(config.barry.mpid.as_str()).filter(|m| !m.is_empty());
    let stored = store.load().unwrap_or_else(|e| {
        warn!("Ignoring unreadable entry file {}: {}", store.path().display(), e);
        None
    });
    if let Some(entry) = reusable_entry(stored, preferred) {
        return Ok(entry);
    }

    let client = BarryClient::from_config(&config.barry)?;
    let flow = SetupFlow::new(&client, Vec::new());
    match flow.step_user(&config.barry.api_token, preferred).await {
        Ok(SetupStep::Created(entry)) => {
            store.save(&entry)?;
            info!("Configured metering point {}", entry.title);
            Ok(entry)
        }
        Ok(SetupStep::ChooseMeteringPoint(options)) => {
            for option in &options {
                info!("Available metering point {} ({})", option.mpid, option.label);
            }
            Err(anyhow::anyhow!(
                "{} metering points found; set barry.mpid or BARRY_MPID to choose one",
                options.len()
            ))
        }
        Err(e) => Err(anyhow::anyhow!("Setup failed [{}]: {}", e.key(), e)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    barry_price::logging::init_logging(&config.logging)?;

    info!("Barry price poller {} starting up", env!("APP_VERSION"));

    let store = EntryStore::new(&config.entry_file);
    let mut entry = resolve_entry(&config, &store).await?;
    if entry.apply_config(&config.barry) {
        info!("Configured Barry settings override the stored entry");
        store.save(&entry)?;
    }

    let source: Arc<dyn PriceSource> = Arc::new(BarryClient::new(
        &entry.api_token,
        &config.barry.endpoint,
        Duration::from_secs(config.barry.request_timeout_seconds.max(1)),
    )?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let settings = RefreshSettings::from_config(&config, &entry.mpid)?;
    let tz = settings.tz;
    let coordinator = Arc::new(PriceCoordinator::new(source, clock.clone(), settings));
    let updates = Arc::new(UpdateCoordinator::new("Barry kWh prices", config.scan_interval()));
    let sensor = Arc::new(PriceSensor::new(&entry.mpid, &entry.currency, tz));

    match updates.first_refresh(coordinator.as_ref()).await {
        Ok(cache) => info!(
            "Current price: {}",
            sensor.state(&cache, clock.now())
        ),
        Err(e) => warn!("{}; retrying on the next cycle", e),
    }

    #[cfg(feature = "web")]
    let web_task = if config.web.enabled {
        let state = barry_price::web::AppState {
            updates: updates.subscribe(),
            sensor: sensor.clone(),
            clock: clock.clone(),
            tz,
        };
        let host = config.web.host.clone();
        let port = config.web.port;
        Some(tokio::spawn(async move {
            if let Err(e) = barry_price::web::serve(state, &host, port).await {
                error!("Web server error: {}", e);
            }
        }))
    } else {
        None
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let updates = updates.clone();
        tokio::spawn(async move { updates.run(coordinator, shutdown_rx).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);
    if let Err(e) = runner.await {
        error!("Refresh loop ended abnormally: {}", e);
    }

    #[cfg(feature = "web")]
    {
        if let Some(task) = web_task {
            task.abort();
        }
    }

    info!("Shutdown complete");
    Ok(())
}
