//! Derived view model handed to consumers

use crate::session::SessionPhase;
use chrono::{DateTime, Utc};
use order_core::{
    DeliveryPartner, DeliveryStatus, GeoPoint, LiveTrackingSnapshot, OrderNumber, OrderSnapshot,
    StatusMeta, TrackingCoordinates, build_route, distance_km,
};
use serde::Serialize;

/// Label shown when neither the feed nor the order carries a delivery estimate
pub const ETA_UNKNOWN: &str = "Calculating ETA";

/// Feed estimates above one day are treated as missing
const MAX_FEED_ESTIMATE_MINUTES: f64 = 24.0 * 60.0;

/// Everything a tracking screen renders, recomputed from the two snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingViewModel {
    pub order_number: OrderNumber,
    pub phase: SessionPhase,
    pub status: DeliveryStatus,
    pub status_meta: StatusMeta,
    pub coordinates: TrackingCoordinates,
    pub distance_km: Option<f64>,
    pub eta_label: String,
    pub route: Vec<GeoPoint>,
    pub agent_bearing_degrees: f64,
    pub delivery_partner: Option<DeliveryPartner>,
    pub has_error: bool,
    pub updated_at: DateTime<Utc>,
}

/// Inputs of one derivation
pub(crate) struct ViewInputs<'a> {
    pub order_number: &'a OrderNumber,
    pub phase: SessionPhase,
    pub status: DeliveryStatus,
    pub order: Option<&'a OrderSnapshot>,
    pub live: Option<&'a LiveTrackingSnapshot>,
    pub agent_bearing_degrees: f64,
    pub has_error: bool,
    pub eta_buffer_minutes: u32,
    pub updated_at: DateTime<Utc>,
}

impl TrackingViewModel {
    pub(crate) fn derive(inputs: ViewInputs<'_>) -> Self {
        let coordinates = resolve_coordinates(inputs.order, inputs.live);

        let distance_km = match (&coordinates.restaurant, &coordinates.destination) {
            (Some(restaurant), Some(destination)) => Some(distance_km(restaurant, destination)),
            _ => None,
        };

        Self {
            order_number: inputs.order_number.clone(),
            phase: inputs.phase,
            status: inputs.status,
            status_meta: inputs.status.metadata(),
            route: build_route(&coordinates, inputs.status),
            coordinates,
            distance_km,
            eta_label: eta_label(inputs.live, inputs.order, inputs.eta_buffer_minutes),
            agent_bearing_degrees: inputs.agent_bearing_degrees,
            delivery_partner: inputs.live.and_then(|live| live.delivery_partner.clone()),
            has_error: inputs.has_error,
            updated_at: inputs.updated_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Map points, preferring the live feed over the order record.
///
/// The courier only appears once the feed reports an assignment.
pub fn resolve_coordinates(
    order: Option<&OrderSnapshot>,
    live: Option<&LiveTrackingSnapshot>,
) -> TrackingCoordinates {
    let restaurant = live
        .and_then(|l| valid(l.restaurant_location.as_ref()))
        .or_else(|| order.and_then(|o| valid(o.restaurant.location.as_ref())));

    let destination = live
        .and_then(|l| valid(l.user_destination.as_ref()))
        .or_else(|| order.and_then(|o| valid(o.delivery_address.location.as_ref())));

    TrackingCoordinates {
        restaurant,
        destination,
        agent: live.and_then(|l| valid(l.agent())),
    }
}

fn valid(point: Option<&GeoPoint>) -> Option<GeoPoint> {
    point.filter(|p| p.is_valid()).cloned()
}

/// Feed estimate plus a handover buffer, else the order's promised window
pub fn eta_label(
    live: Option<&LiveTrackingSnapshot>,
    order: Option<&OrderSnapshot>,
    buffer_minutes: u32,
) -> String {
    let from_feed = live
        .and_then(|l| l.estimated_minutes)
        .filter(|minutes| minutes.is_finite() && *minutes <= MAX_FEED_ESTIMATE_MINUTES)
        .map(|minutes| {
            let rounded = minutes.max(0.0).round() as i64;
            rounded.saturating_add(i64::from(buffer_minutes))
        });

    match from_feed.or_else(|| order.and_then(OrderSnapshot::promised_minutes)) {
        Some(minutes) => format_minutes(minutes),
        None => ETA_UNKNOWN.to_string(),
    }
}

fn format_minutes(minutes: i64) -> String {
    if minutes == 1 {
        "1 min".to_string()
    } else {
        format!("{minutes} mins")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn order() -> OrderSnapshot {
        let mut order = OrderSnapshot::new(OrderNumber::new("ORD-9"), "preparing");
        order.estimated_delivery = Some(order.placed_on + Duration::minutes(45));
        order.restaurant.location = Some(GeoPoint::labeled(12.97, 77.59, "Restaurant"));
        order
    }

    fn live(minutes: Option<f64>) -> LiveTrackingSnapshot {
        LiveTrackingSnapshot {
            restaurant_location: Some(GeoPoint::labeled(12.97, 77.59, "Restaurant")),
            user_destination: Some(GeoPoint::labeled(12.935, 77.625, "Home")),
            agent_location: Some(GeoPoint::labeled(12.93, 77.60, "Courier")),
            estimated_minutes: minutes,
            agent_assign_status: Some("assigned".into()),
            delivery_partner: None,
        }
    }

    #[test]
    fn test_eta_uses_feed_estimate_plus_buffer() {
        assert_eq!(eta_label(Some(&live(Some(15.0))), Some(&order()), 10), "25 mins");
    }

    #[test]
    fn test_eta_falls_back_to_promised_window() {
        assert_eq!(eta_label(Some(&live(None)), Some(&order()), 10), "45 mins");
        assert_eq!(eta_label(None, Some(&order()), 10), "45 mins");
        assert_eq!(eta_label(Some(&live(Some(f64::NAN))), Some(&order()), 10), "45 mins");
    }

    #[test]
    fn test_eta_ignores_implausible_feed_estimate() {
        assert_eq!(eta_label(Some(&live(Some(1e19))), Some(&order()), 10), "45 mins");
        assert_eq!(eta_label(Some(&live(Some(1e19))), None, 10), ETA_UNKNOWN);
        assert_eq!(eta_label(Some(&live(Some(-3.0))), None, 10), "10 mins");
    }

    #[test]
    fn test_eta_unknown_without_any_estimate() {
        let bare = OrderSnapshot::new(OrderNumber::new("ORD-9"), "pending");
        assert_eq!(eta_label(None, Some(&bare), 10), ETA_UNKNOWN);
        assert_eq!(format_minutes(1), "1 min");
    }

    #[test]
    fn test_coordinates_fall_back_to_order() {
        let coords = resolve_coordinates(Some(&order()), None);
        assert!(coords.restaurant.is_some());
        assert!(coords.destination.is_none());
        assert!(coords.agent.is_none());
    }

    #[test]
    fn test_coordinates_skip_invalid_feed_points() {
        let mut feed = live(Some(10.0));
        feed.restaurant_location = Some(GeoPoint::new(f64::NAN, 77.59));
        feed.agent_location = Some(GeoPoint::new(95.0, 77.60));

        let coords = resolve_coordinates(Some(&order()), Some(&feed));
        assert_eq!(coords.restaurant.as_ref().map(|p| p.label.as_str()), Some("Restaurant"));
        assert!(coords.destination.is_some());
        assert!(coords.agent.is_none());
    }

    #[test]
    fn test_derive_skips_distance_when_endpoint_missing() {
        let number = OrderNumber::new("ORD-9");
        let order = order();
        let view = TrackingViewModel::derive(ViewInputs {
            order_number: &number,
            phase: SessionPhase::Loading,
            status: DeliveryStatus::Preparing,
            order: Some(&order),
            live: None,
            agent_bearing_degrees: 0.0,
            has_error: false,
            eta_buffer_minutes: 10,
            updated_at: Utc::now(),
        });

        assert_eq!(view.distance_km, None);
        assert!(view.route.is_empty());
        assert_eq!(view.status_meta.step, 1);
    }

    #[test]
    fn test_derive_on_the_way() {
        let number = OrderNumber::new("ORD-9");
        let order = order();
        let live = live(Some(12.0));
        let view = TrackingViewModel::derive(ViewInputs {
            order_number: &number,
            phase: SessionPhase::Active,
            status: DeliveryStatus::OnTheWay,
            order: Some(&order),
            live: Some(&live),
            agent_bearing_degrees: 166.3,
            has_error: false,
            eta_buffer_minutes: 10,
            updated_at: Utc::now(),
        });

        let distance = view.distance_km.unwrap();
        assert!(distance > 5.3 && distance < 5.6);
        assert_eq!(view.route.len(), 3);
        assert_eq!(view.eta_label, "22 mins");
        assert!(view.coordinates.agent.is_some());
    }
}
