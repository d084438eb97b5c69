//! Service configuration

use order_client::ClientConfig;
use order_tracker::TrackerConfig;
use std::time::Duration;

/// Service configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// REST and WebSocket port
    pub api_port: u16,
    /// Enable CORS for all origins (development)
    pub cors_permissive: bool,
    /// Origin allowed when CORS is not permissive
    pub allowed_origin: String,
    /// Live-location polling period per session
    pub poll_interval_secs: u64,
    /// Minutes added to the feed's ETA
    pub eta_buffer_minutes: u32,
    /// Period of the sweep that drops finished sessions
    pub prune_interval_secs: u64,
    /// Backend order API
    pub client: ClientConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_port: 3000,
            cors_permissive: true,
            allowed_origin: "http://localhost:8080".to_string(),
            poll_interval_secs: 60,
            eta_buffer_minutes: 10,
            prune_interval_secs: 300,
            client: ClientConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from `.env` and environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let number = |key: &str, default: u64| -> u64 {
            var(key)
                .and_then(|s| s.trim().parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(default)
        };

        let api_port = var("API_PORT")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.api_port);

        let cors_permissive = var("CORS_PERMISSIVE")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(defaults.cors_permissive);

        let eta_buffer_minutes = var("ETA_BUFFER_MINUTES")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.eta_buffer_minutes);

        Self {
            api_port,
            cors_permissive,
            allowed_origin: var("CORS_ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin),
            poll_interval_secs: number("POLL_INTERVAL_SECS", defaults.poll_interval_secs),
            eta_buffer_minutes,
            prune_interval_secs: number("PRUNE_INTERVAL_SECS", defaults.prune_interval_secs),
            client: ClientConfig::from_vars(&var),
        }
    }

    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            eta_buffer_minutes: self.eta_buffer_minutes,
            ..TrackerConfig::default()
        }
        .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}
