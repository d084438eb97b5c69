//! # Order Client - HTTP Collaborators
//!
//! `reqwest`-backed implementations of the order-details and live-location
//! fetchers used by tracking sessions.
//!
//! ## Endpoints
//! - `GET {base}/orders/{order_number}?userId={user_id}`
//! - `GET {base}/orders/{order_number}/live-location`

pub mod error;

pub use error::{ClientError, ClientResult};

use async_trait::async_trait;
use order_core::{LiveTrackingSnapshot, OrderNumber, OrderSnapshot, UserId};
use order_tracker::{FetchError, FetchResult, LiveLocationFetcher, OrderFetcher};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:4000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
/// Longest error body carried into a status error
const MAX_ERROR_BODY: usize = 256;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API root, e.g. `https://api.example.com/v1`
    pub base_url: String,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("order-tracker/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let base_url = var("ORDER_API_BASE_URL").unwrap_or(defaults.base_url);

        let request_timeout = match var("ORDER_API_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(value = %raw, "Invalid ORDER_API_TIMEOUT_SECS, using default");
                    defaults.request_timeout
                }
            },
            None => defaults.request_timeout,
        };

        Self {
            base_url,
            request_timeout,
            ..defaults
        }
    }
}

/// Fetches order records and live locations over HTTP
#[derive(Debug, Clone)]
pub struct HttpOrderClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpOrderClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let base_url = Url::parse(config.base_url.trim())
            .map_err(|e| ClientError::invalid_base_url(format!("{}: {e}", config.base_url)))?;

        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(ClientError::invalid_base_url(config.base_url.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        info!(base_url = %base_url, timeout_secs = config.request_timeout.as_secs(), "Order API client ready");

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/orders/{order_number}?userId={user_id}`
    pub fn order_url(&self, order_number: &OrderNumber, user_id: &UserId) -> FetchResult<Url> {
        let mut url = self.endpoint(&["orders", order_number.as_str()])?;
        url.query_pairs_mut().append_pair("userId", user_id.as_str());
        Ok(url)
    }

    /// `{base}/orders/{order_number}/live-location`
    pub fn live_location_url(&self, order_number: &OrderNumber) -> FetchResult<Url> {
        self.endpoint(&["orders", order_number.as_str(), "live-location"])
    }

    fn endpoint(&self, segments: &[&str]) -> FetchResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::transport(format!("base URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, order_number: &OrderNumber) -> FetchResult<T> {
        debug!(order = %order_number, %url, "GET");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::not_found(order_number.as_str()));
        }
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate(&mut body, MAX_ERROR_BODY);
            return Err(FetchError::status(status.as_u16(), body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;

        serde_json::from_slice(&bytes).map_err(|e| FetchError::decode(e.to_string()))
    }
}

#[async_trait]
impl OrderFetcher for HttpOrderClient {
    async fn fetch_order_details(
        &self,
        order_number: &OrderNumber,
        user_id: &UserId,
    ) -> FetchResult<OrderSnapshot> {
        let url = self.order_url(order_number, user_id)?;
        self.get_json(url, order_number).await
    }
}

#[async_trait]
impl LiveLocationFetcher for HttpOrderClient {
    async fn fetch_live_location(
        &self,
        order_number: &OrderNumber,
    ) -> FetchResult<LiveTrackingSnapshot> {
        let url = self.live_location_url(order_number)?;
        self.get_json(url, order_number).await
    }
}

fn truncate(body: &mut String, max: usize) {
    if body.len() <= max {
        return;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
}

// ============================================================================
// TESTS
// ============================================================================
