//! # Order Tracker - Live Delivery Tracking
//!
//! Keeps a per-order tracking session that merges the order record with the
//! courier's live location and republishes a derived view model after every
//! change.
//!
//! ## Features
//! - One-shot order fetch, then periodic live-location polling
//! - Polling stops by itself once the order is delivered, cancelled or refunded
//! - At most one fetch per data source in flight
//! - Results arriving after stop are discarded
//! - Fetch failures keep the last good snapshot and raise an error flag
//! - Callback and broadcast fan-out of view models

pub mod error;
pub mod events;
pub mod fetch;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod view;

pub use error::{FetchError, FetchResult, TrackerError, TrackerResult};
pub use events::ViewModelBus;
pub use fetch::{FetchKind, LiveLocationFetcher, OrderFetcher};
pub use registry::SessionRegistry;
pub use scheduler::{PollScheduler, SingleFlight};
pub use session::{Collaborators, RefreshOutcome, SessionPhase, SessionSnapshot, TrackingSession};
pub use view::{ETA_UNKNOWN, TrackingViewModel, eta_label, resolve_coordinates};

use std::time::Duration;

/// Tracking session configuration
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Live-location polling period
    pub poll_interval: Duration,
    /// Minutes added to the feed's estimate for restaurant handover
    pub eta_buffer_minutes: u32,
    /// Capacity of each session's view model broadcast channel
    pub broadcast_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            eta_buffer_minutes: 10,
            broadcast_capacity: 64,
        }
    }
}

impl TrackerConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================
