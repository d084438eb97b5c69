//! Tracking session for one order
//!
//! A session fetches the order record once, then polls the live-location
//! feed until the order reaches a terminal status or the owner stops it.
//!
//! ```text
//! Idle ──start──▶ Loading ──order + first poll ok──▶ Active ──terminal──▶ Terminal
//!                    │  ▲                                                   ▲
//!                    └──┘ fetch failed: error flag, retried on refresh      │
//!                    └──────────────── terminal order status ───────────────┘
//! ```
//!
//! Fetch results are written only if the session generation is unchanged
//! since the fetch started; [`TrackingSession::stop`] and terminal entry both
//! bump the generation.

use crate::error::{FetchError, FetchResult, TrackerError, TrackerResult};
use crate::events::ViewModelBus;
use crate::fetch::{FetchKind, LiveLocationFetcher, OrderFetcher};
use crate::scheduler::{PollScheduler, SingleFlight};
use crate::view::{TrackingViewModel, ViewInputs, resolve_coordinates};
use crate::TrackerConfig;

use chrono::{DateTime, Utc};
use order_core::{
    DeliveryStatus, LiveTrackingSnapshot, OrderNumber, OrderSnapshot, UserId, bearing_degrees,
};
use order_telemetry::TrackingMetrics;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Idle,
    Loading,
    Active,
    Terminal,
}

/// Result of a manual refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Every issued fetch was merged
    Updated,
    /// A fetch failed; the previous snapshot is kept
    Failed,
    /// A fetch of the same kind was already in flight
    Coalesced,
    /// Not started, stopped or terminal; nothing was fetched
    Inactive,
}

/// What happened to one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    Applied,
    Failed,
    Coalesced,
    Discarded,
}

impl RefreshOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshOutcome::Updated => "updated",
            RefreshOutcome::Failed => "failed",
            RefreshOutcome::Coalesced => "coalesced",
            RefreshOutcome::Inactive => "inactive",
        }
    }
}

impl FetchOutcome {
    fn refresh_outcome(self) -> RefreshOutcome {
        match self {
            FetchOutcome::Applied => RefreshOutcome::Updated,
            FetchOutcome::Failed => RefreshOutcome::Failed,
            FetchOutcome::Coalesced => RefreshOutcome::Coalesced,
            FetchOutcome::Discarded => RefreshOutcome::Inactive,
        }
    }
}

/// The two data sources plus optional metrics
#[derive(Clone)]
pub struct Collaborators {
    pub orders: Arc<dyn OrderFetcher>,
    pub live: Arc<dyn LiveLocationFetcher>,
    pub metrics: Option<Arc<TrackingMetrics>>,
}

impl Collaborators {
    pub fn new(orders: Arc<dyn OrderFetcher>, live: Arc<dyn LiveLocationFetcher>) -> Self {
        Self {
            orders,
            live,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<TrackingMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Point-in-time copy of a session's state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub order_number: OrderNumber,
    pub phase: SessionPhase,
    pub status: DeliveryStatus,
    pub has_error: bool,
    pub last_error: Option<String>,
    pub stopped: bool,
    pub polling: bool,
    pub order: Option<OrderSnapshot>,
    pub live: Option<LiveTrackingSnapshot>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of merging a snapshot into the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
    /// Session is terminal, the snapshot was dropped
    Frozen,
    Applied { terminal: bool, promoted: bool },
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    status: DeliveryStatus,
    order: Option<OrderSnapshot>,
    live: Option<LiveTrackingSnapshot>,
    has_error: bool,
    last_error: Option<String>,
    agent_bearing_degrees: f64,
    updated_at: Option<DateTime<Utc>>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            status: DeliveryStatus::default(),
            order: None,
            live: None,
            has_error: false,
            last_error: None,
            agent_bearing_degrees: 0.0,
            updated_at: None,
        }
    }

    fn apply_order(&mut self, order: OrderSnapshot) -> Merge {
        if self.phase == SessionPhase::Terminal {
            return Merge::Frozen;
        }

        if !DeliveryStatus::is_recognized(&order.status) {
            debug!(
                order = %order.order_number,
                raw_status = %order.status,
                "Unrecognized backend status, treating as pending"
            );
        }

        self.status = order.delivery_status();
        self.order = Some(order);
        self.mark_fresh();
        self.settle(false)
    }

    fn apply_live(&mut self, live: LiveTrackingSnapshot) -> Merge {
        if self.phase == SessionPhase::Terminal {
            return Merge::Frozen;
        }

        if let Some(status) = live.assignment().implied_status() {
            self.status = status;
        }
        self.live = Some(live);

        let coords = resolve_coordinates(self.order.as_ref(), self.live.as_ref());
        if let (Some(restaurant), Some(agent)) = (&coords.restaurant, &coords.agent) {
            self.agent_bearing_degrees = bearing_degrees(restaurant, agent);
        }

        self.mark_fresh();
        self.settle(true)
    }

    fn mark_fresh(&mut self) {
        self.has_error = false;
        self.last_error = None;
        self.updated_at = Some(Utc::now());
    }

    fn settle(&mut self, live_applied: bool) -> Merge {
        if self.status.is_terminal() {
            self.phase = SessionPhase::Terminal;
            return Merge::Applied {
                terminal: true,
                promoted: false,
            };
        }

        let promoted = live_applied && self.phase == SessionPhase::Loading;
        if promoted {
            self.phase = SessionPhase::Active;
        }

        Merge::Applied {
            terminal: false,
            promoted,
        }
    }

    /// Raise the error flag; true when it was previously clear
    fn flag_error(&mut self, kind: FetchKind, error: &FetchError) -> bool {
        let raised = !self.has_error;
        self.has_error = true;
        self.last_error = Some(format!("{kind}: {error}"));
        raised
    }
}

struct SessionInner {
    id: Uuid,
    order_number: OrderNumber,
    user_id: UserId,
    config: TrackerConfig,
    collaborators: Collaborators,
    state: Mutex<SessionState>,
    order_flight: SingleFlight,
    live_flight: SingleFlight,
    generation: AtomicU64,
    stopped: AtomicBool,
    scheduler: Mutex<Option<PollScheduler>>,
    bus: ViewModelBus,
}

/// Live tracking of one order
pub struct TrackingSession {
    inner: Arc<SessionInner>,
}

impl TrackingSession {
    /// Create an idle session bound to one order
    pub fn new(
        order_number: OrderNumber,
        user_id: UserId,
        config: TrackerConfig,
        collaborators: Collaborators,
    ) -> Self {
        let bus = ViewModelBus::new(config.broadcast_capacity);

        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                order_number,
                user_id,
                config,
                collaborators,
                state: Mutex::new(SessionState::new()),
                order_flight: SingleFlight::new(),
                live_flight: SingleFlight::new(),
                generation: AtomicU64::new(0),
                stopped: AtomicBool::new(false),
                scheduler: Mutex::new(None),
                bus,
            }),
        }
    }

    /// Fetch the order, then the first live location, then start polling.
    ///
    /// Fetch failures are not errors here: they leave the session in
    /// `Loading` with the error flag raised until the next [`refresh`].
    ///
    /// [`refresh`]: TrackingSession::refresh
    pub async fn start(&self) -> TrackerResult<SessionPhase> {
        let inner = &self.inner;
        if inner.stopped.load(Ordering::Acquire) {
            return Err(TrackerError::Stopped(inner.order_number.clone()));
        }

        {
            let mut state = inner.state.lock();
            if state.phase != SessionPhase::Idle {
                return Err(TrackerError::AlreadyStarted(inner.order_number.clone()));
            }
            state.phase = SessionPhase::Loading;
        }

        info!(order = %inner.order_number, session = %inner.id, "Tracking session started");
        inner.load().await;

        Ok(self.phase())
    }

    /// Re-run the order fetch and the live fetch outside the timer
    pub async fn refresh(&self) -> RefreshOutcome {
        if self.inner.is_inactive() {
            debug!(order = %self.inner.order_number, "Refresh ignored, session inactive");
            return RefreshOutcome::Inactive;
        }

        self.inner.load().await
    }

    /// Cancel polling and end view streams. Idempotent; in-flight results are discarded.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Register a callback run after every merge
    pub fn on_view_model_change(
        &self,
        callback: impl Fn(&TrackingViewModel) + Send + Sync + 'static,
    ) {
        self.inner.bus.add_listener(callback);
    }

    /// Stream of view models
    pub fn subscribe(&self) -> broadcast::Receiver<TrackingViewModel> {
        self.inner.bus.subscribe()
    }

    /// Cancelled when the session is stopped
    pub fn stop_signal(&self) -> CancellationToken {
        self.inner.bus.closed_signal()
    }

    /// Latest view model, once the order has been fetched
    pub fn view_model(&self) -> Option<TrackingViewModel> {
        self.inner.view_model()
    }

    pub fn state(&self) -> SessionSnapshot {
        let inner = &self.inner;
        let state = inner.state.lock();

        SessionSnapshot {
            session_id: inner.id,
            order_number: inner.order_number.clone(),
            phase: state.phase,
            status: state.status,
            has_error: state.has_error,
            last_error: state.last_error.clone(),
            stopped: inner.stopped.load(Ordering::Acquire),
            polling: inner.is_polling(),
            order: state.order.clone(),
            live: state.live.clone(),
            updated_at: state.updated_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.inner.order_number
    }

    /// Customer whose credentials the session fetches with
    pub fn user_id(&self) -> &UserId {
        &self.inner.user_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.state.lock().phase
    }

    pub fn status(&self) -> DeliveryStatus {
        self.inner.state.lock().status
    }

    pub fn has_error(&self) -> bool {
        self.inner.state.lock().has_error
    }

    pub fn is_terminal(&self) -> bool {
        self.phase() == SessionPhase::Terminal
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// A poll timer is scheduled
    pub fn is_polling(&self) -> bool {
        self.inner.is_polling()
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl SessionInner {
    fn is_inactive(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
            || matches!(
                self.state.lock().phase,
                SessionPhase::Idle | SessionPhase::Terminal
            )
    }

    fn is_polling(&self) -> bool {
        self.scheduler
            .lock()
            .as_ref()
            .is_some_and(|scheduler| !scheduler.is_stopped())
    }

    /// Order fetch, then a live fetch while non-terminal
    async fn load(self: &Arc<Self>) -> RefreshOutcome {
        let order = self.fetch_order().await;
        if order != FetchOutcome::Applied {
            return order.refresh_outcome();
        }

        if self.state.lock().phase == SessionPhase::Terminal {
            return RefreshOutcome::Updated;
        }

        self.fetch_live().await.refresh_outcome()
    }

    /// One timer tick
    async fn poll(self: Arc<Self>) {
        if self.is_inactive() {
            return;
        }

        let outcome = self.fetch_live().await;
        debug!(order = %self.order_number, ?outcome, "Poll tick finished");
    }

    async fn fetch_order(self: &Arc<Self>) -> FetchOutcome {
        let fetched = self
            .guarded(FetchKind::OrderDetails, || {
                self.collaborators
                    .orders
                    .fetch_order_details(&self.order_number, &self.user_id)
            })
            .await;

        match fetched {
            Ok(order) => {
                let merge = self.state.lock().apply_order(order);
                self.after_merge(merge)
            }
            Err(outcome) => outcome,
        }
    }

    async fn fetch_live(self: &Arc<Self>) -> FetchOutcome {
        let fetched = self
            .guarded(FetchKind::LiveLocation, || {
                self.collaborators
                    .live
                    .fetch_live_location(&self.order_number)
            })
            .await;

        match fetched {
            Ok(live) => {
                let merge = self.state.lock().apply_live(live);
                self.after_merge(merge)
            }
            Err(outcome) => outcome,
        }
    }

    /// Run one fetch under the single-flight and generation guards
    async fn guarded<T, F, Fut>(&self, kind: FetchKind, fetch: F) -> Result<T, FetchOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let flight = match kind {
            FetchKind::OrderDetails => &self.order_flight,
            FetchKind::LiveLocation => &self.live_flight,
        };

        let Some(_guard) = flight.try_acquire() else {
            debug!(order = %self.order_number, %kind, "Fetch already in flight, skipping");
            if let Some(metrics) = &self.collaborators.metrics {
                metrics.record_coalesced(kind.as_str());
            }
            return Err(FetchOutcome::Coalesced);
        };

        let generation = self.generation.load(Ordering::Acquire);
        let started = Instant::now();
        let result = fetch().await;
        let elapsed = started.elapsed().as_secs_f64();

        if self.generation.load(Ordering::Acquire) != generation {
            debug!(order = %self.order_number, %kind, "Session halted during fetch, discarding result");
            self.record_fetch(kind, "discarded", elapsed);
            return Err(FetchOutcome::Discarded);
        }

        match result {
            Ok(value) => {
                self.record_fetch(kind, "ok", elapsed);
                Ok(value)
            }
            Err(e) => {
                self.record_fetch(kind, "failed", elapsed);
                warn!(order = %self.order_number, %kind, error = %e, "Fetch failed, keeping last snapshot");

                let raised = self.state.lock().flag_error(kind, &e);
                if raised {
                    self.emit();
                }
                Err(FetchOutcome::Failed)
            }
        }
    }

    fn after_merge(self: &Arc<Self>, merge: Merge) -> FetchOutcome {
        match merge {
            Merge::Frozen => FetchOutcome::Discarded,
            Merge::Applied { terminal, promoted } => {
                if terminal {
                    self.enter_terminal();
                } else if promoted {
                    self.spawn_poller();
                }
                self.emit();
                FetchOutcome::Applied
            }
        }
    }

    fn spawn_poller(self: &Arc<Self>) {
        let mut slot = self.scheduler.lock();
        if self.stopped.load(Ordering::Acquire) || slot.is_some() {
            return;
        }

        let weak = Arc::downgrade(self);
        *slot = Some(PollScheduler::spawn(self.config.poll_interval, move || {
            weak.upgrade().map(SessionInner::poll)
        }));

        info!(
            order = %self.order_number,
            interval_secs = self.config.poll_interval.as_secs(),
            "Live-location polling scheduled"
        );
    }

    fn enter_terminal(&self) {
        let status = self.state.lock().status;
        self.halt();

        info!(order = %self.order_number, %status, "Order reached terminal status, polling stopped");
        if let Some(metrics) = &self.collaborators.metrics {
            metrics.record_terminal(status);
        }
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        self.halt();
        self.bus.close();
        info!(order = %self.order_number, session = %self.id, "Tracking session stopped");
    }

    /// Cancel the timer and invalidate in-flight fetches
    fn halt(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(scheduler) = self.scheduler.lock().as_ref() {
            scheduler.stop();
        }
    }

    fn emit(&self) {
        if let Some(view) = self.view_model() {
            self.bus.publish(view);
        }
    }

    fn view_model(&self) -> Option<TrackingViewModel> {
        let state = self.state.lock();
        state.order.as_ref()?;

        Some(TrackingViewModel::derive(ViewInputs {
            order_number: &self.order_number,
            phase: state.phase,
            status: state.status,
            order: state.order.as_ref(),
            live: state.live.as_ref(),
            agent_bearing_degrees: state.agent_bearing_degrees,
            has_error: state.has_error,
            eta_buffer_minutes: self.config.eta_buffer_minutes,
            updated_at: state.updated_at.unwrap_or_else(Utc::now),
        }))
    }

    fn record_fetch(&self, kind: FetchKind, outcome: &str, elapsed: f64) {
        if let Some(metrics) = &self.collaborators.metrics {
            metrics.record_fetch(kind.as_str(), outcome, elapsed);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
