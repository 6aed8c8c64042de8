use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

use crate::error::AppError;

mod migrations;
mod models;
mod repository;

pub use migrations::run_migrations;
pub use models::{NewTrackedPlayer, PlayerStatsRow, TrackedPlayer, TrackingList};
pub use repository::Repository;

/// Open (creating if needed) the database at `database_url` and apply the schema.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!(database_url, "🗄️ Database connected");

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Private in-memory database with the schema applied.
///
/// Kept to a single connection that never expires, since every new sqlite
/// memory connection would start from an empty database.
pub async fn connect_in_memory() -> Result<SqlitePool, AppError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}
