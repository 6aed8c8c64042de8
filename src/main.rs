use std::sync::Arc;

use streampage_stats::config::Config;
use streampage_stats::db::{self, Repository};
use streampage_stats::error::AppError;
use streampage_stats::logging;
use streampage_stats::riot::RiotClient;
use streampage_stats::service::ProfileStats;
use streampage_stats::stats::StatsCache;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    logging::init();

    info!(platform = %config.platform, "🐙 Starting...");

    let pool = db::connect(&config.database_url).await?;
    let repo = Repository::new(pool);

    let riot = RiotClient::new(
        config.riot_api_key.clone(),
        config.platform,
        config.riot_rate_limit_per_second,
    );

    let cache = Arc::new(StatsCache::new(
        Arc::new(riot),
        Arc::new(repo.clone()),
        config.cache_ttl,
    ));
    let service = Arc::new(ProfileStats::new(cache, repo));

    let (stop_tx, stop_rx) = watch::channel(false);
    let scheduler = service.spawn_bulk_refresh(
        config.bulk_refresh_interval,
        config.bulk_refresh_delay,
        stop_rx,
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }

    info!("🐙 Shutting down, letting the current refresh finish");
    let _ = stop_tx.send(true);

    if let Err(e) = scheduler.await {
        error!(error = %e, "🔄 ❌ Scheduler task panicked");
    }

    Ok(())
}
