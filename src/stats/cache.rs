use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, info, instrument};

use crate::error::AppError;

use super::freshness::{self, Freshness};
use super::traits::{Clock, StatsSource, StatsStore, SystemClock};
use super::types::{
    CachedPlayerStats, DisplayIdentity, MAX_RECENT_MATCHES, MatchResult, PlayerKey,
};

/// Match-v5 queue filter used for the recent match list.
pub const RANKED_QUEUE: &str = "ranked";

/// Time-bounded cache of player statistics in front of a [`StatsSource`].
///
/// Refreshes are serialized per key: concurrent callers for the same key wait
/// for the refresh in flight and reuse its result instead of hitting the
/// provider again.
#[derive(Debug)]
pub struct StatsCache {
    source: Arc<dyn StatsSource>,
    store: Arc<dyn StatsStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    in_flight: DashMap<PlayerKey, Arc<Flight>>,
    /// Held for the whole of a bulk pass.
    bulk_pass: Mutex<()>,
}

#[derive(Debug, Default)]
struct Flight {
    lock: Arc<Mutex<()>>,
    /// Successful refreshes performed under `lock`.
    completed: AtomicU64,
}

/// Holds the per-key refresh lock. The map entry is dropped with the last holder.
struct FlightGuard<'a> {
    map: &'a DashMap<PlayerKey, Arc<Flight>>,
    key: PlayerKey,
    flight: Option<Arc<Flight>>,
    guard: Option<OwnedMutexGuard<()>>,
    seen: u64,
}

impl FlightGuard<'_> {
    fn completed(&self) -> u64 {
        self.flight
            .as_ref()
            .map(|f| f.completed.load(Ordering::Acquire))
            .unwrap_or_default()
    }

    /// Whether another caller finished a refresh while we were waiting for the lock.
    fn refreshed_while_waiting(&self) -> bool {
        self.completed() != self.seen
    }

    fn mark_completed(&self) {
        if let Some(flight) = &self.flight {
            flight.completed.fetch_add(1, Ordering::Release);
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.flight.take();
        // Entry and clone are taken under the same shard lock, so nobody can
        // grab the flight between the count check and the removal.
        self.map
            .remove_if(&self.key, |_, flight| Arc::strong_count(flight) == 1);
    }
}

impl StatsCache {
    pub fn new(source: Arc<dyn StatsSource>, store: Arc<dyn StatsStore>, ttl: Duration) -> Self {
        Self {
            source,
            store,
            clock: Arc::new(SystemClock),
            ttl,
            in_flight: DashMap::new(),
            bulk_pass: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn source(&self) -> &dyn StatsSource {
        self.source.as_ref()
    }

    pub fn store(&self) -> &dyn StatsStore {
        self.store.as_ref()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Keys with a refresh running or awaited.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait until no other bulk pass runs over this cache.
    pub(crate) async fn lock_bulk_pass(&self) -> MutexGuard<'_, ()> {
        self.bulk_pass.lock().await
    }

    /// Serve the stored record when fresh, refresh it otherwise.
    #[instrument(skip(self, identity), fields(puuid = %key, riot_id = %identity))]
    pub async fn get_or_refresh(
        &self,
        key: &PlayerKey,
        identity: &DisplayIdentity,
        force: bool,
    ) -> Result<CachedPlayerStats, AppError> {
        let cached = self.store.get_stats(key).await?;
        let decision = freshness::decide(cached.as_ref(), force, self.ttl, self.clock.now());

        if let (Freshness::UseCached, Some(record)) = (decision, cached) {
            debug!("📦 Cache hit");
            return Ok(record);
        }

        let flight = self.enter_flight(key).await;

        if let Some(record) = self.reusable_after_wait(&flight, key, force).await? {
            debug!("📦 Reusing refresh performed while waiting");
            return Ok(record);
        }

        let record = self.refresh_locked(key, identity).await?;
        flight.mark_completed();
        Ok(record)
    }

    /// Unconditionally refresh `key`, waiting for any refresh already in flight first.
    #[instrument(skip(self, identity), fields(puuid = %key, riot_id = %identity))]
    pub async fn refresh(
        &self,
        key: &PlayerKey,
        identity: &DisplayIdentity,
    ) -> Result<CachedPlayerStats, AppError> {
        let flight = self.enter_flight(key).await;
        let record = self.refresh_locked(key, identity).await?;
        flight.mark_completed();
        Ok(record)
    }

    async fn enter_flight(&self, key: &PlayerKey) -> FlightGuard<'_> {
        let flight = self.in_flight.entry(key.clone()).or_default().clone();
        let seen = flight.completed.load(Ordering::Acquire);
        let guard = flight.lock.clone().lock_owned().await;

        FlightGuard {
            map: &self.in_flight,
            key: key.clone(),
            flight: Some(flight),
            guard: Some(guard),
            seen,
        }
    }

    async fn reusable_after_wait(
        &self,
        flight: &FlightGuard<'_>,
        key: &PlayerKey,
        force: bool,
    ) -> Result<Option<CachedPlayerStats>, AppError> {
        if force && !flight.refreshed_while_waiting() {
            return Ok(None);
        }

        let Some(record) = self.store.get_stats(key).await? else {
            return Ok(None);
        };

        if force {
            return Ok(Some(record));
        }

        let decision = freshness::decide(Some(&record), false, self.ttl, self.clock.now());
        Ok((decision == Freshness::UseCached).then_some(record))
    }

    async fn refresh_locked(
        &self,
        key: &PlayerKey,
        identity: &DisplayIdentity,
    ) -> Result<CachedPlayerStats, AppError> {
        let (standing, recent_matches) = tokio::join!(
            self.source.fetch_ranked_standing(key),
            self.fetch_recent_matches(key),
        );

        let record = CachedPlayerStats {
            key: key.clone(),
            identity: identity.clone(),
            standing,
            recent_matches,
            last_refreshed_at: self.clock.now(),
        };

        let stored = self.store.upsert_stats(&record).await?;

        info!(
            ranked = stored.standing.is_some(),
            matches = stored.recent_matches.len(),
            "📦 ✅ Player stats refreshed"
        );

        Ok(stored)
    }

    async fn fetch_recent_matches(&self, key: &PlayerKey) -> Vec<MatchResult> {
        let ids = self
            .source
            .list_recent_match_ids(key, MAX_RECENT_MATCHES as u32, RANKED_QUEUE)
            .await;

        let details = join_all(
            ids.iter()
                .take(MAX_RECENT_MATCHES)
                .map(|id| self.source.fetch_match_detail(id, key)),
        )
        .await;

        let listed = details.len();
        let matches: Vec<MatchResult> = details.into_iter().flatten().collect();

        if matches.len() < listed {
            debug!(
                dropped = listed - matches.len(),
                "📦 ⚠️ Some matches could not be detailed"
            );
        }

        matches
    }
}
