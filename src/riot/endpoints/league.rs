use crate::error::AppError;
use crate::riot::client::RiotClient;
use crate::riot::types::LeagueEntryDto;

impl RiotClient {
    /// Get league entries (ranked info) for a player by PUUID
    /// Uses platform routing (euw1, na1, kr, etc.)
    pub async fn get_league_entries_by_puuid(
        &self,
        puuid: &str,
    ) -> Result<Vec<LeagueEntryDto>, AppError> {
        let url = self.platform_url(&format!("/lol/league/v4/entries/by-puuid/{puuid}"));

        self.get(&url).await
    }
}
