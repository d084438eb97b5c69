//! Application state management

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

use order_client::HttpOrderClient;
use order_core::OrderNumber;
use order_telemetry::TrackingMetrics;
use order_tracker::{Collaborators, SessionRegistry, TrackingSession};
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    /// One tracking session per order
    pub registry: Arc<SessionRegistry>,
    pub metrics: Arc<TrackingMetrics>,
}

impl AppState {
    /// Wire the HTTP collaborators, metrics and registry
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let metrics = Arc::new(TrackingMetrics::new()?);

        let client = Arc::new(HttpOrderClient::new(&config.client)?);
        let collaborators =
            Collaborators::new(client.clone(), client).with_metrics(metrics.clone());

        let state = Self::with_collaborators(config, collaborators, metrics);
        info!(
            poll_interval_secs = state.config.poll_interval_secs,
            eta_buffer_minutes = state.config.eta_buffer_minutes,
            "Tracking registry initialized"
        );
        Ok(state)
    }

    pub fn with_collaborators(
        config: ApiConfig,
        collaborators: Collaborators,
        metrics: Arc<TrackingMetrics>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.tracker(), collaborators));

        Self {
            config,
            registry,
            metrics,
        }
    }

    /// Look up a tracked session or fail with 404
    pub fn session(&self, order_number: &OrderNumber) -> ApiResult<Arc<TrackingSession>> {
        self.registry
            .get(order_number)
            .ok_or_else(|| ApiError::not_found(format!("Order {order_number} is not being tracked")))
    }
}
