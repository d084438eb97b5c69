//! API request handlers

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::ws;

use axum::{
    Json,
    extract::{Path, State, WebSocketUpgrade},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use order_core::{OrderNumber, UserId};
use order_tracker::{SessionSnapshot, TrackingSession, TrackingViewModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// REQUEST & RESPONSE TYPES
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub active_sessions: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTrackingRequest {
    pub user_id: String,
}

/// Session state plus the latest derived view
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingResponse {
    pub session: SessionSnapshot,
    pub view: Option<TrackingViewModel>,
}

impl TrackingResponse {
    fn from_session(session: &TrackingSession) -> Self {
        Self {
            session: session.state(),
            view: session.view_model(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub outcome: &'static str,
    pub view: Option<TrackingViewModel>,
}

// ============================================================================
// HEALTH & METRICS HANDLERS
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        timestamp: Utc::now().to_rfc3339(),
        active_sessions: state.registry.len(),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export(),
    )
}

// ============================================================================
// TRACKING HANDLERS
// ============================================================================

/// Start tracking an order, or join the existing session
pub async fn start_tracking(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
    Json(request): Json<StartTrackingRequest>,
) -> ApiResult<Json<TrackingResponse>> {
    let order_number = OrderNumber::parse(&order_number)?;
    let user_id = UserId::parse(&request.user_id)?;

    info!(order = %order_number, "Tracking requested");
    let session = state.registry.track(order_number, user_id).await?;

    Ok(Json(TrackingResponse::from_session(&session)))
}

/// Current session state and view
pub async fn get_tracking(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> ApiResult<Json<TrackingResponse>> {
    let order_number = OrderNumber::parse(&order_number)?;
    let session = state.session(&order_number)?;

    Ok(Json(TrackingResponse::from_session(&session)))
}

/// Manual refresh outside the polling timer
pub async fn refresh_tracking(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> ApiResult<Json<RefreshResponse>> {
    let order_number = OrderNumber::parse(&order_number)?;
    let session = state.session(&order_number)?;

    let outcome = session.refresh().await;
    debug!(order = %order_number, outcome = outcome.as_str(), "Manual refresh");

    Ok(Json(RefreshResponse {
        outcome: outcome.as_str(),
        view: session.view_model(),
    }))
}

/// Stop tracking and forget the session
pub async fn stop_tracking(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> ApiResult<StatusCode> {
    let order_number = OrderNumber::parse(&order_number)?;

    if state.registry.untrack(&order_number) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!(
            "Order {order_number} is not being tracked"
        )))
    }
}

/// Stream view models over a WebSocket
pub async fn tracking_ws(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
    upgrade: WebSocketUpgrade,
) -> ApiResult<Response> {
    let order_number = OrderNumber::parse(&order_number)?;
    let session = state.session(&order_number)?;

    Ok(upgrade.on_upgrade(move |socket| ws::stream_session(socket, session)))
}
