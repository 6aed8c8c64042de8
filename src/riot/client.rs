use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::AppError;

use super::region::Platform;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Riot API client shared by every refresh path.
///
/// Cloning is cheap: the HTTP pool and the rate limiter are shared, so every
/// clone draws from the same quota.
#[derive(Clone)]
pub struct RiotClient {
    client: reqwest::Client,
    limiter: Arc<DirectLimiter>,
    /// Riot API Key
    key: String,
    regional_base: String,
    platform_base: String,
}

impl std::fmt::Debug for RiotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiotClient")
            .field("regional_base", &self.regional_base)
            .field("platform_base", &self.platform_base)
            .finish_non_exhaustive()
    }
}

impl RiotClient {
    pub fn new(key: String, platform: Platform, rate_limit_per_second: NonZeroU32) -> Self {
        Self::with_base_urls(
            key,
            platform.to_region().base_url(),
            platform.base_url(),
            rate_limit_per_second,
        )
    }

    /// Builds a client against explicit base URLs (regional route first, platform route second).
    pub fn with_base_urls(
        key: String,
        regional_base: impl Into<String>,
        platform_base: impl Into<String>,
        rate_limit_per_second: NonZeroU32,
    ) -> Self {
        let quota = Quota::per_second(rate_limit_per_second);

        Self {
            client: reqwest::Client::new(),
            limiter: Arc::new(RateLimiter::direct(quota)),
            key,
            regional_base: trim_base(regional_base.into()),
            platform_base: trim_base(platform_base.into()),
        }
    }

    pub(super) fn regional_url(&self, path: &str) -> String {
        format!("{}{}", self.regional_base, path)
    }

    pub(super) fn platform_url(&self, path: &str) -> String {
        format!("{}{}", self.platform_base, path)
    }

    /// Shared GET logic: wait for the rate limiter, send the key, decode a 200 body.
    pub(super) async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, AppError> {
        self.limiter.until_ready().await;

        tracing::trace!(url, "[RIOT::CLIENT] GET");

        let res = self
            .client
            .get(url)
            .header("X-Riot-Token", &self.key)
            .send()
            .await?;

        match res.status() {
            StatusCode::OK => Ok(res.json().await?),
            status => {
                let message = res.text().await.unwrap_or_default();
                Err(AppError::RiotApi {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

fn trim_base(base: String) -> String {
    base.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_propagates_reqwest_error() {
        let client = RiotClient::with_base_urls(
            "RGAPI-INVALID-KEY".into(),
            "ht!tp://invalid-url",
            "ht!tp://invalid-url",
            NonZeroU32::MIN,
        );

        let res: Result<(), AppError> = client.get("ht!tp://invalid-url/x").await;

        assert!(matches!(res, Err(AppError::Http(_))));
    }

    #[test]
    fn base_urls_are_derived_from_platform() {
        let client = RiotClient::new("key".into(), Platform::NA1, NonZeroU32::MIN);

        assert_eq!(
            client.regional_url("/riot/account"),
            "https://americas.api.riotgames.com/riot/account"
        );
        assert_eq!(
            client.platform_url("/lol/league"),
            "https://na1.api.riotgames.com/lol/league"
        );
    }
}
