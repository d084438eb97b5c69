//! Fan-out of view model changes to callbacks and stream subscribers

use crate::view::TrackingViewModel;

use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Listener = Arc<dyn Fn(&TrackingViewModel) + Send + Sync>;

/// Output hook of a tracking session
pub struct ViewModelBus {
    /// Broadcast sender for stream consumers
    sender: broadcast::Sender<TrackingViewModel>,
    /// Synchronous change callbacks
    listeners: RwLock<Vec<Listener>>,
    /// Number of view models published
    published: AtomicU64,
    /// Tripped once the owning session stops
    closed: CancellationToken,
}

impl ViewModelBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            sender,
            listeners: RwLock::new(Vec::new()),
            published: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Subscribe to the stream of view models
    pub fn subscribe(&self) -> broadcast::Receiver<TrackingViewModel> {
        self.sender.subscribe()
    }

    /// Register a callback run synchronously on every publish
    pub fn add_listener(&self, listener: impl Fn(&TrackingViewModel) + Send + Sync + 'static) {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Run callbacks, then broadcast
    pub fn publish(&self, view: TrackingViewModel) {
        // Snapshot so a callback may register further listeners
        let listeners: Vec<Listener> = self.listeners.read().clone();
        for listener in &listeners {
            listener(&view);
        }

        let count = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            order = %view.order_number,
            status = %view.status,
            published = count,
            "View model published"
        );

        let _ = self.sender.send(view);
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Signal stream consumers that no further view models will follow
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token cancelled on [`close`](ViewModelBus::close). Cancelling it does not close the bus.
    pub fn closed_signal(&self) -> CancellationToken {
        self.closed.child_token()
    }
}

impl Default for ViewModelBus {
    fn default() -> Self {
        Self::new(64)
    }
}
