use std::env;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::error::AppError;
use crate::riot::Platform;
use crate::stats::DEFAULT_TTL;

#[derive(Debug, Clone)]
pub struct Config {
    pub riot_api_key: String,
    pub database_url: String,
    pub platform: Platform,
    pub riot_rate_limit_per_second: NonZeroU32,
    pub cache_ttl: Duration,
    pub bulk_refresh_delay: Duration,
    pub bulk_refresh_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        const DEFAULT_RIOT_RATE_LIMIT_PER_SECOND: u32 = 20;
        const DEFAULT_BULK_REFRESH_DELAY_SECS: u64 = 10;
        const DEFAULT_BULK_REFRESH_INTERVAL_SECS: u64 = 3600;

        let riot_api_key = env::var("RIOT_API_KEY")
            .map_err(|_| AppError::Config("RIOT_API_KEY must be set".into()))?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:streampage.db".into());

        let platform = match env::var("RIOT_PLATFORM") {
            Ok(value) => value.parse()?,
            Err(_) => Platform::NA1,
        };

        let riot_rate_limit_per_second = env::var("RIOT_RATE_LIMIT_PER_SECOND")
            .ok()
            .and_then(|v| v.parse().ok())
            .and_then(NonZeroU32::new)
            .unwrap_or_else(|| {
                NonZeroU32::new(DEFAULT_RIOT_RATE_LIMIT_PER_SECOND).unwrap_or(NonZeroU32::MIN)
            });

        let cache_ttl = minutes_or(env::var("CACHE_TTL_MINUTES").ok(), DEFAULT_TTL);
        let bulk_refresh_delay_secs =
            parse_u64("BULK_REFRESH_DELAY_SECS", DEFAULT_BULK_REFRESH_DELAY_SECS);
        let bulk_refresh_interval_secs =
            parse_u64("BULK_REFRESH_INTERVAL_SECS", DEFAULT_BULK_REFRESH_INTERVAL_SECS);

        Ok(Self {
            riot_api_key,
            database_url,
            platform,
            riot_rate_limit_per_second,
            cache_ttl,
            bulk_refresh_delay: Duration::from_secs(bulk_refresh_delay_secs),
            bulk_refresh_interval: Duration::from_secs(bulk_refresh_interval_secs.max(1)),
        })
    }
}

fn parse_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn minutes_or(raw: Option<String>, default: Duration) -> Duration {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .map(|minutes| Duration::from_secs(minutes * 60))
        .unwrap_or(default)
}
