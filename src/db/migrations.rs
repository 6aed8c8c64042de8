use sqlx::SqlitePool;
use tracing::info;

use crate::error::AppError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS player_stats (
    puuid TEXT PRIMARY KEY NOT NULL,
    game_name TEXT NOT NULL,
    tag_line TEXT NOT NULL,
    tier TEXT,
    division TEXT,
    league_points INTEGER,
    wins INTEGER,
    losses INTEGER,
    recent_matches TEXT NOT NULL DEFAULT '[]',
    last_refreshed_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tracked_players (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    list TEXT NOT NULL,
    owner_key TEXT NOT NULL,
    contributor_key TEXT,
    puuid TEXT NOT NULL,
    game_name TEXT NOT NULL,
    tag_line TEXT NOT NULL,
    user_reason TEXT,
    rank_when_added TEXT,
    display_order INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL DEFAULT (unixepoch()),
    UNIQUE (list, owner_key, puuid)
);

CREATE TABLE IF NOT EXISTS hidden_matches (
    owner_key TEXT NOT NULL,
    match_id TEXT NOT NULL,
    puuid TEXT NOT NULL,
    hidden_at INTEGER NOT NULL DEFAULT (unixepoch()),
    PRIMARY KEY (owner_key, match_id)
);

CREATE INDEX IF NOT EXISTS idx_tracked_players_puuid ON tracked_players(puuid);
CREATE INDEX IF NOT EXISTS idx_tracked_players_owner ON tracked_players(list, owner_key);
CREATE INDEX IF NOT EXISTS idx_hidden_matches_account ON hidden_matches(owner_key, puuid);
"#;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    info!("🗄️ Database migrations completed");
    Ok(())
}
