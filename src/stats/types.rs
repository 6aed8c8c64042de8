use std::fmt;
use std::ops::Add;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Number of ranked matches kept per player.
pub const MAX_RECENT_MATCHES: usize = 10;

/// Opaque player identifier handed out by the Riot API (the PUUID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct PlayerKey(String);

impl PlayerKey {
    pub fn new(puuid: impl Into<String>) -> Self {
        Self(puuid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Page owner on whose behalf matches are hidden and lists are kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct OwnerKey(String);

impl OwnerKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Milliseconds since the unix epoch, UTC.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }

    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        Self(millis)
    }

    /// Time elapsed since `earlier`, zero if `earlier` lies in the future.
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        let diff = self.0.saturating_sub(earlier.0).max(0);
        Duration::from_millis(diff as u64)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        let millis = i64::try_from(rhs.as_millis()).unwrap_or(i64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayIdentity {
    pub game_name: String,
    pub tag_line: String,
}

impl DisplayIdentity {
    pub fn new(game_name: impl Into<String>, tag_line: impl Into<String>) -> Self {
        Self {
            game_name: game_name.into(),
            tag_line: tag_line.into(),
        }
    }
}

impl fmt::Display for DisplayIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.game_name, self.tag_line)
    }
}

/// Solo/duo queue standing. `division` is the Riot `rank` field (I..IV).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedStanding {
    pub tier: String,
    pub division: String,
    pub league_points: i32,
    pub wins: i32,
    pub losses: i32,
}

impl RankedStanding {
    pub const UNRANKED: &'static str = "UNRANKED";

    /// `"DIAMOND IV 25LP"`, or `"UNRANKED"` when there is no standing.
    pub fn label(standing: Option<&RankedStanding>) -> String {
        standing
            .map(ToString::to_string)
            .unwrap_or_else(|| Self::UNRANKED.to_string())
    }
}

impl fmt::Display for RankedStanding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}LP", self.tier, self.division, self.league_points)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: String,
    pub champion_id: i64,
    pub champion_name: String,
    pub win: bool,
    pub kills: i32,
    pub deaths: i32,
    pub assists: i32,
}

/// What we currently believe about one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPlayerStats {
    pub key: PlayerKey,
    pub identity: DisplayIdentity,
    pub standing: Option<RankedStanding>,
    /// Newest first, at most [`MAX_RECENT_MATCHES`].
    pub recent_matches: Vec<MatchResult>,
    pub last_refreshed_at: Timestamp,
}

/// Consumer-facing view of a cached record, with hidden matches already removed
/// unless the caller asked for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsView {
    pub key: PlayerKey,
    pub identity: DisplayIdentity,
    pub standing: Option<RankedStanding>,
    pub recent_matches: Vec<MatchResult>,
    pub last_refreshed_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standing_label_matches_rank_string() {
        let standing = RankedStanding {
            tier: "DIAMOND".into(),
            division: "IV".into(),
            league_points: 25,
            wins: 10,
            losses: 8,
        };

        assert_eq!(RankedStanding::label(Some(&standing)), "DIAMOND IV 25LP");
        assert_eq!(RankedStanding::label(None), "UNRANKED");
    }

    #[test]
    fn timestamp_elapsed_never_negative() {
        let t0 = Timestamp::from_millis(1_000);
        let later = t0 + Duration::from_secs(60);

        assert_eq!(later.saturating_since(t0), Duration::from_secs(60));
        assert_eq!(t0.saturating_since(later), Duration::ZERO);
    }
}
