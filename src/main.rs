use anyhow::Result;
use skycache_core::Config;
use skycache_weather::App;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    skycache_core::init()?;

    let (config, _validation) = Config::load_validated().inspect_err(|e| {
        tracing::error!("{} ({})", e.user_message(), e);
    })?;
    tracing::info!(
        "Starting skycache with driver {} (ttl {}s)",
        config.weather.driver.as_str(),
        config.weather.ttl_seconds()
    );

    let mut app = App::new(config).inspect_err(|e| {
        tracing::error!("{} ({})", e.user_message(), e);
    })?;
    let cancel = CancellationToken::new();
    let worker = app.start(cancel.clone());

    if app.config().warm.on_start {
        match app.warm_cache() {
            Ok(summary) => tracing::info!(
                "Warm-up queued {} refreshes across {} pages",
                summary.scheduled,
                summary.pages
            ),
            Err(e) => tracing::error!("Cache warm-up failed: {}", e),
        }
    }

    let mut updates = app.subscribe();
    let log_updates = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => tracing::debug!("{} {}", update.event, update.payload),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Update log lagged, skipped {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    cancel.cancel();
    if let Some(worker) = worker {
        worker.await?;
    }
    log_updates.abort();

    Ok(())
}
