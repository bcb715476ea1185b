//! REST client for the race-tracking service

use crate::error::{BotError, Result};
use crate::types::{CategoryDetail, RaceData};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TOTAL_TIMEOUT_SECS: u64 = 20;
const USER_AGENT: &str = concat!("racetime-bot/", env!("CARGO_PKG_VERSION"));

/// Source of the races currently open in a category
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RaceSource: Send + Sync {
    async fn current_races(&self, category: &str) -> Result<Vec<RaceData>>;
}

/// HTTP client for the public data endpoints
#[derive(Debug, Clone)]
pub struct RacetimeClient {
    client: Client,
    base_url: String,
}

impl RacetimeClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BotError::InternalError {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// `GET <base>/<category>/data`
    pub async fn category_detail(&self, category: &str) -> Result<CategoryDetail> {
        self.get_json(&format!("{}/data", category), category).await
    }

    /// `GET <base>/<category>/<race>/data`. `race` may be the bare slug or the
    /// full `category/slug` name.
    pub async fn race_detail(&self, category: &str, race: &str) -> Result<RaceData> {
        let slug = race.rsplit('/').next().unwrap_or(race);
        self.get_json(&format!("{}/{}/data", category, slug), category)
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, category: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(url = %url, "Fetching race data");

        let fetch_failed = |message: String| BotError::RaceFetchFailed {
            category: category.to_string(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_failed(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(fetch_failed(format!("HTTP error {} from {}", response.status(), url)).into());
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| fetch_failed(format!("invalid response body from {}: {}", url, e)))?;
        Ok(body)
    }
}

#[async_trait]
impl RaceSource for RacetimeClient {
    /// Category listings omit entrants, so races that arrive without them
    /// are filled in from their detail endpoint. A race whose detail fetch
    /// fails is kept as listed.
    async fn current_races(&self, category: &str) -> Result<Vec<RaceData>> {
        let detail = self.category_detail(category).await?;
        let mut races = detail.current_races;

        for race in races.iter_mut().filter(|r| r.entrants.is_empty()) {
            match self.race_detail(category, &race.name).await {
                Ok(full) => *race = full,
                Err(e) => warn!(race = %race.name, "Race detail fetch failed: {:#}", e),
            }
        }

        Ok(races)
    }
}
