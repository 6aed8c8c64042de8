use std::fmt;

use sqlx::FromRow;

use crate::error::AppError;
use crate::stats::{
    CachedPlayerStats, DisplayIdentity, MatchResult, OwnerKey, PlayerKey, RankedStanding,
    Timestamp,
};

#[derive(Debug, Clone, FromRow)]
pub struct PlayerStatsRow {
    pub puuid: PlayerKey,
    pub game_name: String,
    pub tag_line: String,
    pub tier: Option<String>,
    pub division: Option<String>,
    pub league_points: Option<i32>,
    pub wins: Option<i32>,
    pub losses: Option<i32>,
    /// JSON array of [`MatchResult`], newest first.
    pub recent_matches: String,
    pub last_refreshed_at: Timestamp,
}

impl PlayerStatsRow {
    fn standing(&self) -> Option<RankedStanding> {
        match (&self.tier, &self.division) {
            (Some(tier), Some(division)) => Some(RankedStanding {
                tier: tier.clone(),
                division: division.clone(),
                league_points: self.league_points.unwrap_or_default(),
                wins: self.wins.unwrap_or_default(),
                losses: self.losses.unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

impl TryFrom<PlayerStatsRow> for CachedPlayerStats {
    type Error = AppError;

    fn try_from(row: PlayerStatsRow) -> Result<Self, Self::Error> {
        let standing = row.standing();
        let recent_matches: Vec<MatchResult> = serde_json::from_str(&row.recent_matches)?;

        Ok(Self {
            key: row.puuid,
            identity: DisplayIdentity::new(row.game_name, row.tag_line),
            standing,
            recent_matches,
            last_refreshed_at: row.last_refreshed_at,
        })
    }
}

/// The two independent lists a player can be tracked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum TrackingList {
    /// Accounts showcased by the page owner.
    Opgg,
    /// Players reported by contributors.
    IntList,
}

impl fmt::Display for TrackingList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opgg => f.write_str("opgg"),
            Self::IntList => f.write_str("int_list"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TrackedPlayer {
    pub id: i64,
    pub list: TrackingList,
    pub owner_key: OwnerKey,
    pub contributor_key: Option<String>,
    pub puuid: PlayerKey,
    pub game_name: String,
    pub tag_line: String,
    pub user_reason: Option<String>,
    pub rank_when_added: Option<String>,
    pub display_order: i64,
    pub created_at: i64,
}

impl TrackedPlayer {
    pub fn identity(&self) -> DisplayIdentity {
        DisplayIdentity::new(self.game_name.clone(), self.tag_line.clone())
    }
}

#[derive(Debug, Clone)]
pub struct NewTrackedPlayer {
    pub list: TrackingList,
    pub owner_key: OwnerKey,
    pub contributor_key: Option<String>,
    pub puuid: PlayerKey,
    pub identity: DisplayIdentity,
    pub user_reason: Option<String>,
    pub rank_when_added: Option<String>,
    pub display_order: i64,
}
