use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Riot API error: {status} - {message}")]
    RiotApi { status: u16, message: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid summoner name or tagline: {game_name}#{tag_line}")]
    InvalidIdentity { game_name: String, tag_line: String },

    #[error("Riot API unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Player is not tracked")]
    NotTracked,

    #[error("Account already added")]
    AlreadyTracked,

    #[error("Match {0} not found in recent matches")]
    MatchNotFound(String),
}

impl AppError {
    /// Whether the error stems from the Riot API rather than from local state.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::RiotApi { .. } | Self::Http(_) | Self::UpstreamUnavailable(_)
        )
    }
}
