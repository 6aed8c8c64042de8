use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::AppError;

use super::types::{
    CachedPlayerStats, DisplayIdentity, MatchResult, PlayerKey, RankedStanding, Timestamp,
};

/// Upstream provider of player statistics.
///
/// Only identity resolution may fail: the other calls absorb provider errors
/// and report "no data" instead, so callers never tell the two apart.
#[async_trait]
pub trait StatsSource: Send + Sync + Debug {
    async fn resolve_player_key(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> Result<PlayerKey, AppError>;

    async fn fetch_ranked_standing(&self, key: &PlayerKey) -> Option<RankedStanding>;

    /// Match ids newest first. Empty on any failure.
    async fn list_recent_match_ids(&self, key: &PlayerKey, count: u32, queue: &str) -> Vec<String>;

    /// `None` when the provider fails or `key` did not play in the match.
    async fn fetch_match_detail(&self, match_id: &str, key: &PlayerKey) -> Option<MatchResult>;
}

/// Persisted cache of player statistics.
#[async_trait]
pub trait StatsStore: Send + Sync + Debug {
    async fn get_stats(&self, key: &PlayerKey) -> Result<Option<CachedPlayerStats>, AppError>;

    /// Insert or fully replace the record for `stats.key` in one atomic write and
    /// return what is now stored.
    async fn upsert_stats(&self, stats: &CachedPlayerStats) -> Result<CachedPlayerStats, AppError>;

    /// Every tracked key once, in first-tracked order, with its last known identity.
    async fn tracked_identities(&self) -> Result<Vec<(PlayerKey, DisplayIdentity)>, AppError>;
}

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
