#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use streampage_stats::db::{self, Repository};
use streampage_stats::error::AppError;
use streampage_stats::stats::{
    CachedPlayerStats, Clock, DisplayIdentity, MatchResult, PlayerKey, RankedStanding,
    StatsCache, StatsSource, StatsStore, Timestamp,
};

pub const T0: Timestamp = Timestamp::from_millis(1_700_000_000_000);
pub const TTL: Duration = Duration::from_secs(30 * 60);

pub fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

pub fn game(id: &str, win: bool) -> MatchResult {
    MatchResult {
        match_id: id.to_string(),
        champion_id: 157,
        champion_name: "Yasuo".to_string(),
        win,
        kills: 7,
        deaths: 11,
        assists: 2,
    }
}

pub fn diamond(lp: i32) -> RankedStanding {
    RankedStanding {
        tier: "DIAMOND".to_string(),
        division: "IV".to_string(),
        league_points: lp,
        wins: 51,
        losses: 49,
    }
}

pub fn match_ids(matches: &[MatchResult]) -> Vec<&str> {
    matches.iter().map(|m| m.match_id.as_str()).collect()
}

/// Scripted Riot API double counting every call it receives.
#[derive(Debug, Default)]
pub struct FakeSource {
    accounts: Mutex<HashMap<(String, String), PlayerKey>>,
    standings: Mutex<HashMap<PlayerKey, RankedStanding>>,
    recent: Mutex<HashMap<PlayerKey, Vec<MatchResult>>>,
    /// Listed ids whose detail lookup fails.
    undetailed: Mutex<HashSet<String>>,
    latency: Mutex<Option<Duration>>,
    pub resolve_calls: AtomicUsize,
    pub standing_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    /// Standing fetches running right now, and the most seen at once.
    active_refreshes: AtomicUsize,
    pub max_active_refreshes: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_account(&self, game_name: &str, tag_line: &str, puuid: &str) {
        self.accounts.lock().unwrap().insert(
            (game_name.to_string(), tag_line.to_string()),
            PlayerKey::new(puuid),
        );
    }

    pub fn set_standing(&self, puuid: &str, standing: Option<RankedStanding>) {
        let mut standings = self.standings.lock().unwrap();
        match standing {
            Some(s) => standings.insert(PlayerKey::new(puuid), s),
            None => standings.remove(&PlayerKey::new(puuid)),
        };
    }

    pub fn set_matches(&self, puuid: &str, matches: Vec<MatchResult>) {
        self.recent
            .lock()
            .unwrap()
            .insert(PlayerKey::new(puuid), matches);
    }

    pub fn fail_detail(&self, match_id: &str) {
        self.undetailed.lock().unwrap().insert(match_id.to_string());
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Calls that hit the provider on behalf of a refresh.
    pub fn refresh_calls(&self) -> usize {
        self.standing_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
            + self.standing_calls.load(Ordering::SeqCst)
            + self.list_calls.load(Ordering::SeqCst)
            + self.detail_calls.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl StatsSource for FakeSource {
    async fn resolve_player_key(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> Result<PlayerKey, AppError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.accounts
            .lock()
            .unwrap()
            .get(&(game_name.to_string(), tag_line.to_string()))
            .cloned()
            .ok_or_else(|| AppError::InvalidIdentity {
                game_name: game_name.to_string(),
                tag_line: tag_line.to_string(),
            })
    }

    async fn fetch_ranked_standing(&self, key: &PlayerKey) -> Option<RankedStanding> {
        self.standing_calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active_refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_refreshes.fetch_max(active, Ordering::SeqCst);
        self.wait().await;
        self.active_refreshes.fetch_sub(1, Ordering::SeqCst);
        self.standings.lock().unwrap().get(key).cloned()
    }

    async fn list_recent_match_ids(
        &self,
        key: &PlayerKey,
        count: u32,
        queue: &str,
    ) -> Vec<String> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(queue, "ranked");
        self.wait().await;
        self.recent
            .lock()
            .unwrap()
            .get(key)
            .map(|matches| {
                matches
                    .iter()
                    .take(count as usize)
                    .map(|m| m.match_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn fetch_match_detail(&self, match_id: &str, key: &PlayerKey) -> Option<MatchResult> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if self.undetailed.lock().unwrap().contains(match_id) {
            return None;
        }
        self.recent
            .lock()
            .unwrap()
            .get(key)
            .and_then(|matches| matches.iter().find(|m| m.match_id == match_id).cloned())
    }
}

#[derive(Debug)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn at(ts: Timestamp) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(ts.as_millis())))
    }

    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.0.load(Ordering::SeqCst))
    }
}

/// Repository whose upserts fail for one key.
#[derive(Debug)]
pub struct FlakyStore {
    inner: Repository,
    failing: PlayerKey,
}

impl FlakyStore {
    pub fn new(inner: Repository, failing: &str) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing: PlayerKey::new(failing),
        })
    }
}

#[async_trait]
impl StatsStore for FlakyStore {
    async fn get_stats(&self, key: &PlayerKey) -> Result<Option<CachedPlayerStats>, AppError> {
        self.inner.get_stats(key).await
    }

    async fn upsert_stats(&self, stats: &CachedPlayerStats) -> Result<CachedPlayerStats, AppError> {
        if stats.key == self.failing {
            return Err(AppError::Persistence(sqlx::Error::PoolClosed));
        }
        self.inner.upsert_stats(stats).await
    }

    async fn tracked_identities(&self) -> Result<Vec<(PlayerKey, DisplayIdentity)>, AppError> {
        self.inner.tracked_identities().await
    }
}

/// Repository that prunes unreferenced stats right after every upsert, the way
/// a scheduled pass running alongside would.
#[derive(Debug)]
pub struct PruningStore {
    inner: Repository,
}

impl PruningStore {
    pub fn new(inner: Repository) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl StatsStore for PruningStore {
    async fn get_stats(&self, key: &PlayerKey) -> Result<Option<CachedPlayerStats>, AppError> {
        self.inner.get_stats(key).await
    }

    async fn upsert_stats(&self, stats: &CachedPlayerStats) -> Result<CachedPlayerStats, AppError> {
        let stored = self.inner.upsert_stats(stats).await?;
        self.inner.prune_untracked_stats().await?;
        Ok(stored)
    }

    async fn tracked_identities(&self) -> Result<Vec<(PlayerKey, DisplayIdentity)>, AppError> {
        self.inner.tracked_identities().await
    }
}

/// Poll `done` until it holds, failing the test after a few seconds.
pub async fn wait_until(done: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub async fn repository() -> Repository {
    Repository::new(db::connect_in_memory().await.expect("in-memory database"))
}

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub repo: Repository,
    pub clock: Arc<ManualClock>,
    pub cache: Arc<StatsCache>,
}

pub async fn harness() -> Harness {
    let source = FakeSource::new();
    let repo = repository().await;
    harness_with_store(source, repo.clone(), Arc::new(repo)).await
}

pub async fn harness_with_store(
    source: Arc<FakeSource>,
    repo: Repository,
    store: Arc<dyn StatsStore>,
) -> Harness {
    let clock = ManualClock::at(T0);
    let cache = Arc::new(StatsCache::new(source.clone(), store, TTL).with_clock(clock.clone()));

    Harness {
        source,
        repo,
        clock,
        cache,
    }
}
