//! Waypoint list for the delivery polyline

use crate::{DeliveryStatus, GeoPoint};
use serde::Serialize;

/// The named points of one order, any of which may still be unknown
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackingCoordinates {
    pub restaurant: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
    pub agent: Option<GeoPoint>,
}

impl TrackingCoordinates {
    /// Restaurant and destination are both known
    pub fn has_endpoints(&self) -> bool {
        self.restaurant.is_some() && self.destination.is_some()
    }
}

/// Build the ordered waypoints to draw for the current status.
///
/// Terminal orders have nothing to draw. While the courier is on the way the
/// route bends through the courier's position. An empty list is also returned
/// when either endpoint is missing.
pub fn build_route(coords: &TrackingCoordinates, status: DeliveryStatus) -> Vec<GeoPoint> {
    if status.is_terminal() {
        return Vec::new();
    }

    let (Some(restaurant), Some(destination)) = (&coords.restaurant, &coords.destination) else {
        return Vec::new();
    };

    match (&coords.agent, status) {
        (Some(agent), DeliveryStatus::OnTheWay) => {
            vec![restaurant.clone(), agent.clone(), destination.clone()]
        }
        _ => vec![restaurant.clone(), destination.clone()],
    }
}

// ============================================================================
// TESTS
// ============================================================================
