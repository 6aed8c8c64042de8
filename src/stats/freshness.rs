use std::time::Duration;

use super::types::{CachedPlayerStats, Timestamp};

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    UseCached,
    MustRefresh,
}

/// Whether `record` can be served as is at `now`.
pub fn decide(
    record: Option<&CachedPlayerStats>,
    force: bool,
    ttl: Duration,
    now: Timestamp,
) -> Freshness {
    match record {
        None => Freshness::MustRefresh,
        Some(_) if force => Freshness::MustRefresh,
        Some(record) if now.saturating_since(record.last_refreshed_at) >= ttl => {
            Freshness::MustRefresh
        }
        Some(_) => Freshness::UseCached,
    }
}
