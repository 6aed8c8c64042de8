use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::models::{NewTrackedPlayer, PlayerStatsRow, TrackedPlayer, TrackingList};
use crate::error::AppError;
use crate::stats::{CachedPlayerStats, DisplayIdentity, OwnerKey, PlayerKey, StatsStore};

const STATS_COLUMNS: &str = "puuid, game_name, tag_line, tier, division, league_points, wins, \
     losses, recent_matches, last_refreshed_at";

const TRACKED_COLUMNS: &str = "id, list, owner_key, contributor_key, puuid, game_name, tag_line, \
     user_reason, rank_when_added, display_order, created_at";

#[derive(Clone, Debug)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // === Player stats ===

    pub async fn get_player_stats(
        &self,
        puuid: &PlayerKey,
    ) -> Result<Option<CachedPlayerStats>, AppError> {
        let row = sqlx::query_as::<_, PlayerStatsRow>(&format!(
            "SELECT {STATS_COLUMNS} FROM player_stats WHERE puuid = ?"
        ))
        .bind(puuid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CachedPlayerStats::try_from).transpose()
    }

    /// Single-statement upsert: either the whole new record lands or the old one
    /// stays. `last_refreshed_at` keeps the later of the stored and incoming values.
    pub async fn upsert_player_stats(
        &self,
        stats: &CachedPlayerStats,
    ) -> Result<CachedPlayerStats, AppError> {
        let recent_matches = serde_json::to_string(&stats.recent_matches)?;
        let standing = stats.standing.as_ref();

        let query = format!(
            r#"
            INSERT INTO player_stats (
                puuid, game_name, tag_line, tier, division, league_points, wins, losses,
                recent_matches, last_refreshed_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(puuid) DO UPDATE SET
                game_name = excluded.game_name,
                tag_line = excluded.tag_line,
                tier = excluded.tier,
                division = excluded.division,
                league_points = excluded.league_points,
                wins = excluded.wins,
                losses = excluded.losses,
                recent_matches = excluded.recent_matches,
                last_refreshed_at = MAX(player_stats.last_refreshed_at, excluded.last_refreshed_at)
            RETURNING {STATS_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, PlayerStatsRow>(&query)
            .bind(&stats.key)
            .bind(&stats.identity.game_name)
            .bind(&stats.identity.tag_line)
            .bind(standing.map(|s| &s.tier))
            .bind(standing.map(|s| &s.division))
            .bind(standing.map(|s| s.league_points))
            .bind(standing.map(|s| s.wins))
            .bind(standing.map(|s| s.losses))
            .bind(recent_matches)
            .bind(stats.last_refreshed_at)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    /// Delete cached stats no tracking entry refers to anymore.
    pub async fn prune_untracked_stats(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM player_stats WHERE puuid NOT IN (SELECT puuid FROM tracked_players)",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Distinct tracked PUUIDs in first-tracked order. The cached identity wins
    /// over the one recorded when the player was tracked.
    pub async fn get_tracked_identities(
        &self,
    ) -> Result<Vec<(PlayerKey, DisplayIdentity)>, AppError> {
        let rows = sqlx::query_as::<_, (PlayerKey, String, String)>(
            r#"
            SELECT t.puuid,
                   COALESCE(s.game_name, t.game_name),
                   COALESCE(s.tag_line, t.tag_line)
            FROM tracked_players t
            LEFT JOIN player_stats s ON s.puuid = t.puuid
            WHERE t.id = (SELECT MIN(id) FROM tracked_players WHERE puuid = t.puuid)
            ORDER BY t.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(puuid, game_name, tag_line)| (puuid, DisplayIdentity::new(game_name, tag_line)))
            .collect())
    }

    // === Tracking lists ===

    pub async fn insert_tracked_player(
        &self,
        entry: &NewTrackedPlayer,
    ) -> Result<TrackedPlayer, AppError> {
        let query = format!(
            r#"
            INSERT INTO tracked_players (
                list, owner_key, contributor_key, puuid, game_name, tag_line,
                user_reason, rank_when_added, display_order
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {TRACKED_COLUMNS}
            "#
        );

        let tracked = sqlx::query_as::<_, TrackedPlayer>(&query)
            .bind(entry.list)
            .bind(&entry.owner_key)
            .bind(&entry.contributor_key)
            .bind(&entry.puuid)
            .bind(&entry.identity.game_name)
            .bind(&entry.identity.tag_line)
            .bind(&entry.user_reason)
            .bind(&entry.rank_when_added)
            .bind(entry.display_order)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => AppError::AlreadyTracked,
                e => AppError::from(e),
            })?;
        Ok(tracked)
    }

    pub async fn set_rank_when_added(&self, id: i64, rank: &str) -> Result<TrackedPlayer, AppError> {
        let query = format!(
            r#"
            UPDATE tracked_players SET rank_when_added = ?
            WHERE id = ?
            RETURNING {TRACKED_COLUMNS}
            "#
        );

        sqlx::query_as::<_, TrackedPlayer>(&query)
            .bind(rank)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotTracked)
    }

    pub async fn get_tracked_player(&self, id: i64) -> Result<Option<TrackedPlayer>, AppError> {
        let tracked = sqlx::query_as::<_, TrackedPlayer>(&format!(
            "SELECT {TRACKED_COLUMNS} FROM tracked_players WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tracked)
    }

    pub async fn find_tracked_player(
        &self,
        list: TrackingList,
        owner_key: &OwnerKey,
        puuid: &PlayerKey,
    ) -> Result<Option<TrackedPlayer>, AppError> {
        let tracked = sqlx::query_as::<_, TrackedPlayer>(&format!(
            r#"
            SELECT {TRACKED_COLUMNS}
            FROM tracked_players
            WHERE list = ? AND owner_key = ? AND puuid = ?
            "#
        ))
        .bind(list)
        .bind(owner_key)
        .bind(puuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tracked)
    }

    /// Earliest tracking entry for `puuid` across both lists.
    pub async fn first_tracking_of(
        &self,
        puuid: &PlayerKey,
    ) -> Result<Option<TrackedPlayer>, AppError> {
        let tracked = sqlx::query_as::<_, TrackedPlayer>(&format!(
            "SELECT {TRACKED_COLUMNS} FROM tracked_players WHERE puuid = ? ORDER BY id ASC LIMIT 1"
        ))
        .bind(puuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tracked)
    }

    pub async fn get_tracked_players(
        &self,
        list: TrackingList,
        owner_key: &OwnerKey,
    ) -> Result<Vec<TrackedPlayer>, AppError> {
        let tracked = sqlx::query_as::<_, TrackedPlayer>(&format!(
            r#"
            SELECT {TRACKED_COLUMNS}
            FROM tracked_players
            WHERE list = ? AND owner_key = ?
            ORDER BY display_order ASC, id ASC
            "#
        ))
        .bind(list)
        .bind(owner_key)
        .fetch_all(&self.pool)
        .await?;
        Ok(tracked)
    }

    pub async fn count_tracked_players(
        &self,
        list: TrackingList,
        owner_key: &OwnerKey,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tracked_players WHERE list = ? AND owner_key = ?",
        )
        .bind(list)
        .bind(owner_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn remove_tracked_player(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tracked_players WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Give each id its position in `ids` as display order. Ids outside the list are skipped.
    pub async fn set_display_order(
        &self,
        list: TrackingList,
        owner_key: &OwnerKey,
        ids: &[i64],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for (order, id) in ids.iter().enumerate() {
            sqlx::query(
                r#"
                UPDATE tracked_players SET display_order = ?
                WHERE id = ? AND list = ? AND owner_key = ?
                "#,
            )
            .bind(order as i64)
            .bind(id)
            .bind(list)
            .bind(owner_key)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn update_user_reason(&self, id: i64, reason: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE tracked_players SET user_reason = ? WHERE id = ?")
            .bind(reason)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // === Hidden matches ===

    /// Marks are keyed by owner and match. The first account a match was hidden
    /// from is the one recorded.
    pub async fn hide_match(
        &self,
        owner_key: &OwnerKey,
        puuid: &PlayerKey,
        match_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO hidden_matches (owner_key, match_id, puuid)
            VALUES (?, ?, ?)
            ON CONFLICT(owner_key, match_id) DO NOTHING
            "#,
        )
        .bind(owner_key)
        .bind(match_id)
        .bind(puuid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn unhide_match(
        &self,
        owner_key: &OwnerKey,
        match_id: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM hidden_matches WHERE owner_key = ? AND match_id = ?")
            .bind(owner_key)
            .bind(match_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete the marks recorded against `puuid` together with any mark on one
    /// of `match_ids`, whichever account it was recorded against.
    pub async fn unhide_all_matches(
        &self,
        owner_key: &OwnerKey,
        puuid: &PlayerKey,
        match_ids: &[String],
    ) -> Result<u64, AppError> {
        let match_ids = serde_json::to_string(match_ids)?;

        let result = sqlx::query(
            r#"
            DELETE FROM hidden_matches
            WHERE owner_key = ?
              AND (puuid = ? OR match_id IN (SELECT value FROM json_each(?)))
            "#,
        )
        .bind(owner_key)
        .bind(puuid)
        .bind(match_ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_hidden_match_ids(
        &self,
        owner_key: &OwnerKey,
    ) -> Result<HashSet<String>, AppError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT match_id FROM hidden_matches WHERE owner_key = ?",
        )
        .bind(owner_key)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl StatsStore for Repository {
    async fn get_stats(&self, key: &PlayerKey) -> Result<Option<CachedPlayerStats>, AppError> {
        self.get_player_stats(key).await
    }

    async fn upsert_stats(&self, stats: &CachedPlayerStats) -> Result<CachedPlayerStats, AppError> {
        self.upsert_player_stats(stats).await
    }

    async fn tracked_identities(&self) -> Result<Vec<(PlayerKey, DisplayIdentity)>, AppError> {
        self.get_tracked_identities().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::stats::{MatchResult, RankedStanding, Timestamp};

    async fn repo() -> Repository {
        Repository::new(db::connect_in_memory().await.unwrap())
    }

    fn game(id: &str) -> MatchResult {
        MatchResult {
            match_id: id.into(),
            champion_id: 222,
            champion_name: "Jinx".into(),
            win: false,
            kills: 3,
            deaths: 9,
            assists: 4,
        }
    }

    fn stats(puuid: &str, at: i64, matches: &[&str]) -> CachedPlayerStats {
        CachedPlayerStats {
            key: PlayerKey::new(puuid),
            identity: DisplayIdentity::new("Doublelift", "NA1"),
            standing: Some(RankedStanding {
                tier: "DIAMOND".into(),
                division: "IV".into(),
                league_points: 25,
                wins: 40,
                losses: 38,
            }),
            recent_matches: matches.iter().map(|id| game(id)).collect(),
            last_refreshed_at: Timestamp::from_millis(at),
        }
    }

    fn tracked(list: TrackingList, owner: &str, puuid: &str, name: &str) -> NewTrackedPlayer {
        NewTrackedPlayer {
            list,
            owner_key: OwnerKey::new(owner),
            contributor_key: None,
            puuid: PlayerKey::new(puuid),
            identity: DisplayIdentity::new(name, "NA1"),
            user_reason: None,
            rank_when_added: None,
            display_order: 0,
        }
    }

    #[tokio::test]
    async fn upsert_inserts_then_replaces_every_field() {
        let repo = repo().await;

        let first = repo
            .upsert_player_stats(&stats("p1", 1_000, &["m3", "m2", "m1"]))
            .await
            .unwrap();
        assert_eq!(first.recent_matches.len(), 3);

        let mut next = stats("p1", 2_000, &["m4", "m3"]);
        next.standing = None;
        next.identity = DisplayIdentity::new("Renamed", "NA2");

        let stored = repo.upsert_player_stats(&next).await.unwrap();

        assert_eq!(stored, next);
        assert_eq!(repo.get_player_stats(&next.key).await.unwrap(), Some(next));
    }

    #[tokio::test]
    async fn upsert_never_rolls_back_timestamp() {
        let repo = repo().await;

        repo.upsert_player_stats(&stats("p1", 5_000, &["m1"]))
            .await
            .unwrap();
        let stored = repo
            .upsert_player_stats(&stats("p1", 4_000, &["m2"]))
            .await
            .unwrap();

        assert_eq!(stored.last_refreshed_at, Timestamp::from_millis(5_000));
        assert_eq!(stored.recent_matches[0].match_id, "m2");
    }

    #[tokio::test]
    async fn tracked_identities_are_deduplicated_in_first_tracked_order() {
        let repo = repo().await;

        repo.insert_tracked_player(&tracked(TrackingList::IntList, "o", "p2", "Second"))
            .await
            .unwrap();
        repo.insert_tracked_player(&tracked(TrackingList::Opgg, "o", "p1", "First"))
            .await
            .unwrap();
        repo.insert_tracked_player(&tracked(TrackingList::Opgg, "o", "p2", "SecondAgain"))
            .await
            .unwrap();
        repo.upsert_player_stats(&stats("p1", 1, &[])).await.unwrap();

        let identities = repo.get_tracked_identities().await.unwrap();

        assert_eq!(
            identities,
            vec![
                (PlayerKey::new("p2"), DisplayIdentity::new("Second", "NA1")),
                (PlayerKey::new("p1"), DisplayIdentity::new("Doublelift", "NA1")),
            ]
        );
    }

    #[tokio::test]
    async fn prune_keeps_stats_referenced_by_either_list() {
        let repo = repo().await;

        let entry = repo
            .insert_tracked_player(&tracked(TrackingList::Opgg, "o", "p1", "A"))
            .await
            .unwrap();
        repo.insert_tracked_player(&tracked(TrackingList::IntList, "o", "p1", "A"))
            .await
            .unwrap();
        repo.upsert_player_stats(&stats("p1", 1, &[])).await.unwrap();
        repo.upsert_player_stats(&stats("p9", 1, &[])).await.unwrap();

        assert_eq!(repo.prune_untracked_stats().await.unwrap(), 1);

        repo.remove_tracked_player(entry.id).await.unwrap();
        assert_eq!(repo.prune_untracked_stats().await.unwrap(), 0);
        assert!(
            repo.get_player_stats(&PlayerKey::new("p1"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn hidden_marks_by_owner_and_account() {
        let repo = repo().await;
        let owner = OwnerKey::new("rosie");
        let p1 = PlayerKey::new("p1");
        let p2 = PlayerKey::new("p2");

        repo.hide_match(&owner, &p1, "m1").await.unwrap();
        repo.hide_match(&owner, &p1, "m1").await.unwrap();
        repo.hide_match(&owner, &p1, "m2").await.unwrap();
        repo.hide_match(&owner, &p2, "m7").await.unwrap();

        assert_eq!(repo.get_hidden_match_ids(&owner).await.unwrap().len(), 3);
        assert_eq!(repo.unhide_all_matches(&owner, &p1, &[]).await.unwrap(), 2);
        assert_eq!(
            repo.get_hidden_match_ids(&owner).await.unwrap(),
            HashSet::from(["m7".to_string()])
        );
        assert_eq!(repo.unhide_match(&owner, "m7").await.unwrap(), 1);
        assert!(repo.get_hidden_match_ids(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn shared_match_is_unhidden_from_either_account() {
        let repo = repo().await;
        let owner = OwnerKey::new("rosie");
        let p1 = PlayerKey::new("p1");
        let p2 = PlayerKey::new("p2");

        repo.hide_match(&owner, &p1, "duo").await.unwrap();
        repo.hide_match(&owner, &p2, "duo").await.unwrap();
        repo.hide_match(&owner, &p1, "solo").await.unwrap();

        let removed = repo
            .unhide_all_matches(&owner, &p2, &["duo".to_string(), "m9".to_string()])
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(
            repo.get_hidden_match_ids(&owner).await.unwrap(),
            HashSet::from(["solo".to_string()])
        );
    }

    #[tokio::test]
    async fn duplicate_entry_is_reported_as_already_tracked() {
        let repo = repo().await;

        repo.insert_tracked_player(&tracked(TrackingList::Opgg, "o", "p1", "A"))
            .await
            .unwrap();
        let err = repo
            .insert_tracked_player(&tracked(TrackingList::Opgg, "o", "p1", "A"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AlreadyTracked));
        repo.insert_tracked_player(&tracked(TrackingList::IntList, "o", "p1", "A"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rank_when_added_is_set_once_refreshed() {
        let repo = repo().await;
        let entry = repo
            .insert_tracked_player(&tracked(TrackingList::IntList, "o", "p1", "A"))
            .await
            .unwrap();

        let updated = repo
            .set_rank_when_added(entry.id, "GOLD I 12LP")
            .await
            .unwrap();

        assert_eq!(updated.rank_when_added.as_deref(), Some("GOLD I 12LP"));
        assert_eq!(updated.id, entry.id);
        assert!(matches!(
            repo.set_rank_when_added(999, "x").await.unwrap_err(),
            AppError::NotTracked
        ));
    }

    #[tokio::test]
    async fn display_order_follows_given_ids() {
        let repo = repo().await;
        let owner = OwnerKey::new("rosie");

        let a = repo
            .insert_tracked_player(&tracked(TrackingList::Opgg, "rosie", "pa", "A"))
            .await
            .unwrap();
        let b = repo
            .insert_tracked_player(&tracked(TrackingList::Opgg, "rosie", "pb", "B"))
            .await
            .unwrap();

        repo.set_display_order(TrackingList::Opgg, &owner, &[b.id, a.id, 999])
            .await
            .unwrap();

        let names: Vec<String> = repo
            .get_tracked_players(TrackingList::Opgg, &owner)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.game_name)
            .collect();
        assert_eq!(names, vec!["B", "A"]);
    }
}
