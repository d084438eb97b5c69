//! End-to-end tracking scenarios against scripted collaborators

use async_trait::async_trait;
use order_core::{
    DeliveryPartner, DeliveryStatus, GeoPoint, LiveTrackingSnapshot, OrderNumber, OrderSnapshot,
    UserId,
};
use order_tracker::{
    Collaborators, FetchError, FetchResult, LiveLocationFetcher, OrderFetcher, RefreshOutcome,
    SessionPhase, TrackerConfig, TrackingSession,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time;

// ============================================================================
// SCRIPTED BACKEND
// ============================================================================

/// Replays queued responses, then repeats the last success
struct Script<T> {
    queue: Mutex<VecDeque<FetchResult<T>>>,
    last: Mutex<Option<T>>,
    calls: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl<T: Clone> Script<T> {
    fn new(responses: impl IntoIterator<Item = FetchResult<T>>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(responses.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Block later calls until the returned handle is notified
    fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    fn push(&self, response: FetchResult<T>) {
        self.queue.lock().push_back(response);
    }

    async fn next(&self) -> FetchResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let next = self.queue.lock().pop_front();
        match next {
            Some(Ok(value)) => {
                *self.last.lock() = Some(value.clone());
                Ok(value)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .clone()
                .ok_or_else(|| FetchError::transport("no scripted response")),
        }
    }
}

#[async_trait]
impl OrderFetcher for Script<OrderSnapshot> {
    async fn fetch_order_details(
        &self,
        _order_number: &OrderNumber,
        _user_id: &UserId,
    ) -> FetchResult<OrderSnapshot> {
        self.next().await
    }
}

#[async_trait]
impl LiveLocationFetcher for Script<LiveTrackingSnapshot> {
    async fn fetch_live_location(
        &self,
        _order_number: &OrderNumber,
    ) -> FetchResult<LiveTrackingSnapshot> {
        self.next().await
    }
}

fn restaurant() -> GeoPoint {
    GeoPoint::labeled(12.97, 77.59, "Spice Route Kitchen")
}

fn home() -> GeoPoint {
    GeoPoint::labeled(12.935, 77.625, "Home")
}

fn order(status: &str) -> OrderSnapshot {
    let mut order = OrderSnapshot::new(OrderNumber::new("ORD-1001"), status);
    order.restaurant.location = Some(restaurant());
    order.delivery_address.location = Some(home());
    order
}

fn live(assign: Option<&str>, minutes: Option<f64>) -> LiveTrackingSnapshot {
    LiveTrackingSnapshot {
        restaurant_location: Some(restaurant()),
        user_destination: Some(home()),
        agent_location: Some(GeoPoint::labeled(12.93, 77.60, "Courier")),
        estimated_minutes: minutes,
        agent_assign_status: assign.map(str::to_string),
        delivery_partner: Some(DeliveryPartner {
            name: "Ravi".into(),
            phone: Some("+91-90000-00000".into()),
        }),
    }
}

fn session(
    orders: &Arc<Script<OrderSnapshot>>,
    feed: &Arc<Script<LiveTrackingSnapshot>>,
) -> TrackingSession {
    TrackingSession::new(
        OrderNumber::new("ORD-1001"),
        UserId::new("user-1"),
        TrackerConfig::default(),
        Collaborators::new(orders.clone(), feed.clone()),
    )
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_on_the_way_order_renders_courier_route() {
    let orders = Script::new([Ok(order("Out for delivery"))]);
    let feed = Script::new([Ok(live(Some("assigned"), Some(15.0)))]);

    let session = session(&orders, &feed);
    let mut views = session.subscribe();
    session.start().await.unwrap();

    let view = session.view_model().unwrap();
    assert_eq!(view.phase, SessionPhase::Active);
    assert_eq!(view.status, DeliveryStatus::OnTheWay);
    assert_eq!(view.status_meta.step, 3);
    assert_eq!(view.eta_label, "25 mins");
    assert_eq!(view.route.len(), 3);
    assert_eq!(view.route[1].label, "Courier");
    assert!((view.distance_km.unwrap() - 5.43).abs() < 0.05);
    assert!((view.agent_bearing_degrees - 166.3).abs() < 0.5);
    assert_eq!(view.delivery_partner.unwrap().name, "Ravi");

    // One view per merge; the courier appears with the live feed
    let from_order = views.try_recv().unwrap();
    assert_eq!(from_order.phase, SessionPhase::Loading);
    assert_eq!(from_order.route.len(), 2);
    assert_eq!(views.try_recv().unwrap().route.len(), 3);
    assert!(views.try_recv().is_err());

    session.stop();
}

#[tokio::test(start_paused = true)]
async fn test_delivery_mid_poll_stops_timer() {
    let orders = Script::new([Ok(order("on the way"))]);
    let feed = Script::new([
        Ok(live(Some("assigned"), Some(8.0))),
        Ok(live(Some("delivered"), Some(0.0))),
    ]);

    let session = session(&orders, &feed);
    session.start().await.unwrap();
    assert!(session.is_polling());

    time::sleep(Duration::from_secs(61)).await;

    assert_eq!(session.phase(), SessionPhase::Terminal);
    assert_eq!(session.status(), DeliveryStatus::Delivered);
    assert!(!session.is_polling());
    assert!(session.view_model().unwrap().route.is_empty());
    assert_eq!(feed.calls(), 2);

    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(feed.calls(), 2);

    assert_eq!(session.refresh().await, RefreshOutcome::Inactive);
    assert_eq!(orders.calls(), 1);
    assert_eq!(feed.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_polls_keep_last_snapshot() {
    let orders = Script::new([Ok(order("preparing"))]);
    let feed = Script::new([
        Ok(live(None, Some(20.0))),
        Err(FetchError::transport("connection reset")),
        Err(FetchError::status(502, "bad gateway")),
        Err(FetchError::decode("expected value at line 1")),
    ]);

    let session = session(&orders, &feed);
    let errors_seen = Arc::new(AtomicUsize::new(0));
    let counter = errors_seen.clone();
    session.on_view_model_change(move |view| {
        if view.has_error {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    session.start().await.unwrap();
    let before = session.view_model().unwrap();

    time::sleep(Duration::from_secs(181)).await;
    assert_eq!(feed.calls(), 4);
    assert!(session.has_error());
    assert_eq!(session.phase(), SessionPhase::Active);
    assert!(session.is_polling());

    let during = session.view_model().unwrap();
    assert!(during.has_error);
    assert_eq!(during.eta_label, before.eta_label);
    assert_eq!(during.coordinates, before.coordinates);
    // The flag is announced once, not per failure
    assert_eq!(errors_seen.load(Ordering::SeqCst), 1);

    feed.push(Ok(live(Some("assigned"), Some(5.0))));
    time::sleep(Duration::from_secs(60)).await;

    assert!(!session.has_error());
    let after = session.view_model().unwrap();
    assert_eq!(after.status, DeliveryStatus::OnTheWay);
    assert_eq!(after.eta_label, "15 mins");

    session.stop();
}

#[tokio::test(start_paused = true)]
async fn test_refresh_during_poll_does_not_duplicate_fetch() {
    let orders = Script::new([Ok(order("preparing")), Ok(order("ready for pickup"))]);
    let feed = Script::new([Ok(live(None, Some(20.0))), Ok(live(None, Some(18.0)))]);

    let session = session(&orders, &feed);
    session.start().await.unwrap();

    let gate = feed.hold();
    time::sleep(Duration::from_secs(61)).await;
    assert_eq!(feed.calls(), 2);

    assert_eq!(session.refresh().await, RefreshOutcome::Coalesced);
    assert_eq!(orders.calls(), 2);
    assert_eq!(feed.calls(), 2);
    assert_eq!(session.status(), DeliveryStatus::ReadyForPickup);

    gate.notify_one();
    time::sleep(Duration::from_secs(1)).await;
    assert_eq!(session.view_model().unwrap().eta_label, "28 mins");
    assert!(!session.has_error());

    session.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_discards_in_flight_result() {
    let orders = Script::new([Ok(order("preparing"))]);
    let feed = Script::new([Ok(live(None, Some(20.0))), Ok(live(Some("delivered"), None))]);

    let session = session(&orders, &feed);
    session.start().await.unwrap();

    let published = Arc::new(AtomicUsize::new(0));
    let counter = published.clone();
    session.on_view_model_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let gate = feed.hold();
    time::sleep(Duration::from_secs(61)).await;
    assert_eq!(feed.calls(), 2);

    session.stop();
    session.stop();
    gate.notify_one();
    time::sleep(Duration::from_secs(1)).await;

    assert!(session.is_stopped());
    assert!(!session.is_polling());
    assert_eq!(session.status(), DeliveryStatus::Preparing);
    assert_eq!(session.phase(), SessionPhase::Active);
    assert_eq!(published.load(Ordering::SeqCst), 0);

    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(feed.calls(), 2);
    assert_eq!(session.refresh().await, RefreshOutcome::Inactive);
}

#[tokio::test(start_paused = true)]
async fn test_initial_failure_waits_for_manual_refresh() {
    let orders = Script::new([Err(FetchError::not_found("ORD-1001")), Ok(order("confirmed"))]);
    let feed = Script::new([Ok(live(None, None))]);

    let session = session(&orders, &feed);
    assert_eq!(session.start().await.unwrap(), SessionPhase::Loading);
    assert!(session.has_error());
    assert!(session.view_model().is_none());

    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(feed.calls(), 0);
    assert!(!session.is_polling());

    assert_eq!(session.refresh().await, RefreshOutcome::Updated);
    assert_eq!(session.phase(), SessionPhase::Active);
    assert!(!session.has_error());
    assert!(session.is_polling());

    let snapshot = session.state();
    assert_eq!(snapshot.status, DeliveryStatus::Confirmed);
    assert!(snapshot.live.is_some());
    assert!(snapshot.last_error.is_none());

    session.stop();
}
