//! Consumer-facing operations over the two tracking lists, the hidden-match
//! marks and the stats cache.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

use crate::db::{NewTrackedPlayer, Repository, TrackedPlayer, TrackingList};
use crate::error::AppError;
use crate::stats::scheduler::{self, BulkReport};
use crate::stats::{
    CachedPlayerStats, DisplayIdentity, OwnerKey, PlayerKey, RankedStanding, StatsCache,
    StatsView, overlay,
};

#[derive(Debug, Clone)]
pub struct TrackRequest {
    pub list: TrackingList,
    pub owner: OwnerKey,
    pub contributor: Option<String>,
    pub game_name: String,
    pub tag_line: String,
    /// Only kept for the int list.
    pub user_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackedEntryView {
    pub id: i64,
    pub display_order: i64,
    pub user_reason: Option<String>,
    pub rank_when_added: Option<String>,
    /// `None` until the player has been refreshed once.
    pub stats: Option<StatsView>,
}

#[derive(Debug, Clone)]
pub struct ProfileStats {
    cache: Arc<StatsCache>,
    repo: Repository,
}

impl ProfileStats {
    pub fn new(cache: Arc<StatsCache>, repo: Repository) -> Self {
        Self { cache, repo }
    }

    pub fn cache(&self) -> &StatsCache {
        &self.cache
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    // === Tracking ===

    /// Resolve the Riot ID, add the player to `req.list` and force a refresh.
    ///
    /// The entry exists before its stats row is written, so pruning never
    /// removes the new row. A failed refresh removes the entry again.
    #[instrument(
        skip(self, req),
        fields(
            list = %req.list,
            owner = %req.owner,
            riot_id = %format!("{}#{}", req.game_name, req.tag_line),
        )
    )]
    pub async fn track_player(&self, req: TrackRequest) -> Result<TrackedPlayer, AppError> {
        let puuid = self
            .cache
            .source()
            .resolve_player_key(&req.game_name, &req.tag_line)
            .await?;

        if self
            .repo
            .find_tracked_player(req.list, &req.owner, &puuid)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyTracked);
        }

        let identity = DisplayIdentity::new(req.game_name, req.tag_line);
        let user_reason = match req.list {
            TrackingList::IntList => req.user_reason,
            TrackingList::Opgg => None,
        };

        let display_order = self
            .repo
            .count_tracked_players(req.list, &req.owner)
            .await?;

        let entry = self
            .repo
            .insert_tracked_player(&NewTrackedPlayer {
                list: req.list,
                owner_key: req.owner,
                contributor_key: req.contributor,
                puuid: puuid.clone(),
                identity: identity.clone(),
                user_reason,
                rank_when_added: None,
                display_order,
            })
            .await?;

        let stats = match self.cache.get_or_refresh(&puuid, &identity, true).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(entry_id = entry.id, error = %e, "⚠️ Refresh failed, dropping entry");
                if let Err(rollback) = self.repo.remove_tracked_player(entry.id).await {
                    error!(entry_id = entry.id, error = %rollback, "❌ Failed to drop entry");
                }
                return Err(e);
            }
        };

        let entry = match entry.list {
            TrackingList::IntList => {
                let rank = RankedStanding::label(stats.standing.as_ref());
                self.repo.set_rank_when_added(entry.id, &rank).await?
            }
            TrackingList::Opgg => entry,
        };

        info!(entry_id = entry.id, "Player tracked successfully");
        Ok(entry)
    }

    /// Remove the tracking entry only; cached stats are left for [`Self::prune_untracked`].
    #[instrument(skip(self))]
    pub async fn untrack(&self, entry_id: i64) -> Result<TrackedPlayer, AppError> {
        let entry = self
            .repo
            .get_tracked_player(entry_id)
            .await?
            .ok_or(AppError::NotTracked)?;

        if !self.repo.remove_tracked_player(entry_id).await? {
            return Err(AppError::NotTracked);
        }

        info!(puuid = %entry.puuid, list = %entry.list, "Player untracked successfully");
        Ok(entry)
    }

    pub async fn prune_untracked(&self) -> Result<u64, AppError> {
        let pruned = self.repo.prune_untracked_stats().await?;
        if pruned > 0 {
            info!(pruned, "🗄️ Pruned stats of untracked players");
        }
        Ok(pruned)
    }

    pub async fn reorder(
        &self,
        list: TrackingList,
        owner: &OwnerKey,
        entry_ids: &[i64],
    ) -> Result<(), AppError> {
        self.repo.set_display_order(list, owner, entry_ids).await
    }

    pub async fn update_reason(&self, entry_id: i64, reason: &str) -> Result<(), AppError> {
        if self.repo.update_user_reason(entry_id, reason).await? {
            Ok(())
        } else {
            Err(AppError::NotTracked)
        }
    }

    // === Reads ===

    /// Stats for `puuid`, refreshed first if stale, with `owner`'s hidden matches removed
    /// unless `include_hidden` is set.
    pub async fn read_stats(
        &self,
        owner: &OwnerKey,
        puuid: &PlayerKey,
        include_hidden: bool,
    ) -> Result<StatsView, AppError> {
        let identity = self.last_known_identity(puuid).await?;
        let stats = self.cache.get_or_refresh(puuid, &identity, false).await?;
        let hidden = self.hidden_for(owner, include_hidden).await?;

        Ok(to_view(stats, &hidden))
    }

    /// Same as [`Self::read_stats`] for the player a tracking entry points at.
    pub async fn read_entry(
        &self,
        entry_id: i64,
        include_hidden: bool,
    ) -> Result<StatsView, AppError> {
        let entry = self
            .repo
            .get_tracked_player(entry_id)
            .await?
            .ok_or(AppError::NotTracked)?;

        self.read_stats(&entry.owner_key, &entry.puuid, include_hidden)
            .await
    }

    /// Entries of one list in display order, served from the cache as is.
    pub async fn list_entries(
        &self,
        list: TrackingList,
        owner: &OwnerKey,
        include_hidden: bool,
    ) -> Result<Vec<TrackedEntryView>, AppError> {
        let entries = self.repo.get_tracked_players(list, owner).await?;
        let hidden = self.hidden_for(owner, include_hidden).await?;

        let mut views = Vec::with_capacity(entries.len());
        for entry in entries {
            let stats = self
                .repo
                .get_player_stats(&entry.puuid)
                .await?
                .map(|stats| to_view(stats, &hidden));

            views.push(TrackedEntryView {
                id: entry.id,
                display_order: entry.display_order,
                user_reason: entry.user_reason,
                rank_when_added: entry.rank_when_added,
                stats,
            });
        }

        Ok(views)
    }

    // === Hidden matches ===

    /// Hide one of the matches currently cached for `puuid`.
    pub async fn hide_match(
        &self,
        owner: &OwnerKey,
        puuid: &PlayerKey,
        match_id: &str,
    ) -> Result<(), AppError> {
        let stats = self
            .repo
            .get_player_stats(puuid)
            .await?
            .ok_or(AppError::NotTracked)?;

        if !stats.recent_matches.iter().any(|m| m.match_id == match_id) {
            return Err(AppError::MatchNotFound(match_id.to_string()));
        }

        self.repo.hide_match(owner, puuid, match_id).await?;
        info!(owner = %owner, puuid = %puuid, match_id, "Match hidden");
        Ok(())
    }

    pub async fn unhide_match(&self, owner: &OwnerKey, match_id: &str) -> Result<u64, AppError> {
        self.repo.unhide_match(owner, match_id).await
    }

    /// Clear every mark hiding a match of `puuid`: the ones recorded against it and
    /// the ones recorded against another account that hide one of its current
    /// matches.
    pub async fn unhide_all(&self, owner: &OwnerKey, puuid: &PlayerKey) -> Result<u64, AppError> {
        let current: Vec<String> = self
            .repo
            .get_player_stats(puuid)
            .await?
            .map(|stats| stats.recent_matches.into_iter().map(|m| m.match_id).collect())
            .unwrap_or_default();

        self.repo.unhide_all_matches(owner, puuid, &current).await
    }

    // === Refresh ===

    pub async fn refresh_now(&self, puuid: &PlayerKey) -> Result<CachedPlayerStats, AppError> {
        let identity = self.last_known_identity(puuid).await?;
        self.cache.get_or_refresh(puuid, &identity, true).await
    }

    pub async fn refresh_all(
        &self,
        delay: Duration,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<BulkReport, AppError> {
        scheduler::run_bulk_refresh(&self.cache, delay, cancel).await
    }

    /// Run [`Self::refresh_all`] every `every`, pruning untracked stats after each
    /// pass, until `cancel` is raised.
    pub fn spawn_bulk_refresh(
        self: Arc<Self>,
        every: Duration,
        delay: Duration,
        mut cancel: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(every_secs = every.as_secs(), "🔄 Bulk refresh scheduler started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = scheduler::cancelled(&mut cancel) => break,
                }

                match self.refresh_all(delay, &mut cancel).await {
                    Ok(report) if report.cancelled => break,
                    Ok(report) if !report.failures.is_empty() => {
                        warn!(
                            failed = report.failures.len(),
                            "🔄 ⚠️ Bulk refresh had failures"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = ?e, "🔄 ❌ Bulk refresh cycle failed"),
                }

                if let Err(e) = self.prune_untracked().await {
                    error!(error = ?e, "🗄️ ❌ Pruning untracked stats failed");
                }
            }

            info!("🔄 Bulk refresh scheduler stopped");
        })
    }

    async fn last_known_identity(&self, puuid: &PlayerKey) -> Result<DisplayIdentity, AppError> {
        if let Some(stats) = self.repo.get_player_stats(puuid).await? {
            return Ok(stats.identity);
        }

        self.repo
            .first_tracking_of(puuid)
            .await?
            .map(|entry| entry.identity())
            .ok_or(AppError::NotTracked)
    }

    async fn hidden_for(
        &self,
        owner: &OwnerKey,
        include_hidden: bool,
    ) -> Result<HashSet<String>, AppError> {
        if include_hidden {
            Ok(HashSet::new())
        } else {
            self.repo.get_hidden_match_ids(owner).await
        }
    }
}

fn to_view(stats: CachedPlayerStats, hidden: &HashSet<String>) -> StatsView {
    StatsView {
        recent_matches: overlay::visible(&stats.recent_matches, hidden),
        key: stats.key,
        identity: stats.identity,
        standing: stats.standing,
        last_refreshed_at: stats.last_refreshed_at,
    }
}
