use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::stats::{MatchResult, PlayerKey, RankedStanding, StatsSource};

use super::client::RiotClient;

#[async_trait]
impl StatsSource for RiotClient {
    async fn resolve_player_key(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> Result<PlayerKey, AppError> {
        match self.get_account_by_riot_id(game_name, tag_line).await {
            Ok(account) => Ok(PlayerKey::new(account.puuid)),
            Err(e @ AppError::InvalidIdentity { .. }) => Err(e),
            Err(e) => {
                warn!(
                    error = %e,
                    riot_id = %format!("{game_name}#{tag_line}"),
                    "🛰️ ⚠️ Account lookup failed"
                );
                Err(AppError::UpstreamUnavailable(e.to_string()))
            }
        }
    }

    async fn fetch_ranked_standing(&self, key: &PlayerKey) -> Option<RankedStanding> {
        let entries = match self.get_league_entries_by_puuid(key.as_str()).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, puuid = %key, "🛰️ ⚠️ League lookup failed");
                return None;
            }
        };

        let entry = entries.into_iter().find(|e| e.is_solo_queue())?;

        let (Some(tier), Some(division)) = (entry.tier, entry.rank) else {
            debug!(puuid = %key, "🛰️ Solo queue entry without tier");
            return None;
        };

        Some(RankedStanding {
            tier,
            division,
            league_points: entry.league_points,
            wins: entry.wins,
            losses: entry.losses,
        })
    }

    async fn list_recent_match_ids(&self, key: &PlayerKey, count: u32, queue: &str) -> Vec<String> {
        self.get_match_ids(key.as_str(), count, queue)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, puuid = %key, "🛰️ ⚠️ Match id lookup failed");
                Vec::new()
            })
    }

    async fn fetch_match_detail(&self, match_id: &str, key: &PlayerKey) -> Option<MatchResult> {
        let match_data = match self.get_match(match_id).await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, match_id, "🛰️ ⚠️ Match lookup failed");
                return None;
            }
        };

        let Some(participant) = match_data.participant(key.as_str()) else {
            debug!(match_id, puuid = %key, "🛰️ Player not found in match");
            return None;
        };

        Some(MatchResult {
            match_id: match_id.to_string(),
            champion_id: participant.champion_id,
            champion_name: participant.champion_name.clone(),
            win: participant.win,
            kills: participant.kills,
            deaths: participant.deaths,
            assists: participant.assists,
        })
    }
}
