pub mod errors;
pub mod models;
pub mod query;

use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{config::Config, threshold_cache::Thresholds};

use self::{
    errors::ApiError,
    models::{Alert, AlertCounts, Page, SensorReading, Stats, ThresholdsResponse},
    query::ListQuery,
};

/// Upper bound the backend accepts for `GET /alerts/recent?limit`.
pub const MAX_RECENT_ALERTS: u32 = 50;

/// Read-only client for the sensor backend REST API.
///
/// Cheap to clone; all clones share one connection pool. Every request is
/// bounded by the configured timeout and is never retried here.
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.api_base_url, config.request_timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid API base URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("API base URL cannot carry a path: {base_url}");
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner: Arc::new(Inner { http, base_url }),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// `GET /sensor-data/`: paginated raw readings, newest first.
    ///
    /// The endpoint has no severity filter; a severity set on `query` is
    /// not forwarded.
    pub async fn sensor_data(&self, query: &ListQuery) -> Result<Page<SensorReading>, ApiError> {
        let pairs: Vec<_> = query
            .pairs()
            .into_iter()
            .filter(|(key, _)| *key != "severity")
            .collect();
        self.get("sensor-data/", &pairs).await
    }

    /// `GET /sensor-data/latest`: most recent reading per topic.
    pub async fn latest_readings(&self) -> Result<Vec<SensorReading>, ApiError> {
        self.get("sensor-data/latest", &[]).await
    }

    pub async fn stats(&self) -> Result<Stats, ApiError> {
        self.get("sensor-data/stats", &[]).await
    }

    /// `GET /sensor-data/thresholds`. A band with `min > max` is rejected as
    /// a malformed response.
    pub async fn thresholds(&self) -> Result<Thresholds, ApiError> {
        let path = "sensor-data/thresholds";
        let resp: ThresholdsResponse = self.get(path, &[]).await?;
        Thresholds::try_from(resp.thresholds).map_err(|e| ApiError::decode(path, e))
    }

    /// `GET /sensor-data/topics`: every topic that has sent data.
    pub async fn topics(&self) -> Result<Vec<String>, ApiError> {
        self.get("sensor-data/topics", &[]).await
    }

    /// `GET /alerts/`: paginated alerts, newest first.
    pub async fn alerts(&self, query: &ListQuery) -> Result<Page<Alert>, ApiError> {
        self.get("alerts/", &query.pairs()).await
    }

    /// `GET /alerts/recent?limit`. `limit` is clamped to `1..=50`.
    pub async fn recent_alerts(&self, limit: u32) -> Result<Vec<Alert>, ApiError> {
        let limit = limit.clamp(1, MAX_RECENT_ALERTS);
        self.get("alerts/recent", &[("limit", limit.to_string())]).await
    }

    pub async fn alert_counts(&self) -> Result<AlertCounts, ApiError> {
        self.get("alerts/count", &[]).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(path, query);
        debug!(url = %url, "GET");

        let resp = self
            .inner
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ApiError::Network {
                path: path.to_owned(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                path: path.to_owned(),
                status,
            });
        }

        let bytes = resp.bytes().await.map_err(|source| ApiError::Network {
            path: path.to_owned(),
            source,
        })?;

        serde_json::from_slice::<T>(&bytes).map_err(|e| ApiError::decode(path, e))
    }

    /// Append `path` to the base URL and attach `query`. Trailing slashes in
    /// `path` are kept; the backend distinguishes `alerts/` from `alerts`.
    fn url(&self, path: &str, query: &[(&str, String)]) -> Url {
        let mut url = self.inner.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path.split('/'));
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        url
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
