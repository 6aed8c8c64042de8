use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::error::AppError;

use super::cache::StatsCache;
use super::types::{DisplayIdentity, PlayerKey};

/// Failure to refresh one tracked key during a bulk run.
#[derive(Debug)]
pub struct BulkItemError {
    pub key: PlayerKey,
    pub identity: DisplayIdentity,
    pub error: AppError,
}

#[derive(Debug, Default)]
pub struct BulkReport {
    /// Distinct tracked keys found at the start of the run.
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<BulkItemError>,
    /// The run stopped early on the cancellation signal.
    pub cancelled: bool,
}

impl BulkReport {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failures.len()
    }
}

/// Refresh every tracked player once, one at a time, `delay` apart.
///
/// `cancel` is only looked at between players: a refresh that has started
/// always runs to completion. Passes over the same cache never overlap: a
/// second caller waits for the running pass to finish first.
#[instrument(skip(cache, cancel), fields(delay_secs = delay.as_secs()))]
pub async fn run_bulk_refresh(
    cache: &StatsCache,
    delay: Duration,
    cancel: &mut watch::Receiver<bool>,
) -> Result<BulkReport, AppError> {
    let _pass = tokio::select! {
        biased;
        pass = cache.lock_bulk_pass() => pass,
        _ = cancelled(cancel) => {
            info!("🔄 Bulk refresh cancelled while waiting for the running pass");
            return Ok(BulkReport {
                cancelled: true,
                ..Default::default()
            });
        }
    };

    let tracked = cache.store().tracked_identities().await?;
    let total = tracked.len();
    let mut report = BulkReport {
        total,
        ..Default::default()
    };

    if tracked.is_empty() {
        info!("🔄 No tracked players to refresh");
        return Ok(report);
    }

    info!(total, "🔄 Starting bulk refresh of {} player(s)", total);

    for (i, (key, identity)) in tracked.into_iter().enumerate() {
        let position = i + 1;

        if *cancel.borrow() {
            report.cancelled = true;
            break;
        }

        debug!(position, total, riot_id = %identity, "🔄 Refreshing");

        match cache.refresh(&key, &identity).await {
            Ok(_) => {
                report.succeeded += 1;
                debug!(position, total, riot_id = %identity, "🔄 ✅ Refreshed");
            }
            Err(error) => {
                error!(
                    position,
                    total,
                    puuid = %key,
                    riot_id = %identity,
                    error = %error,
                    "🔄 ❌ Failed to refresh player"
                );
                report.failures.push(BulkItemError {
                    key,
                    identity,
                    error,
                });
            }
        }

        if position < total {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancelled(cancel) => {
                    report.cancelled = true;
                    break;
                }
            }
        }
    }

    info!(
        succeeded = report.succeeded,
        failed = report.failures.len(),
        total,
        cancelled = report.cancelled,
        "🔄 Bulk refresh finished: {}/{} succeeded",
        report.succeeded,
        total
    );

    Ok(report)
}

/// Resolves once the signal is raised; never resolves if the sender is gone.
pub async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
