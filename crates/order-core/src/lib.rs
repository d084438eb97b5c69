//! # Order Core
//!
//! Domain models and pure computations for order live-tracking.
//! This crate provides the types shared by the tracker, the HTTP
//! collaborators and the service binary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod geo;
pub mod route;
pub mod status;

pub use error::{CoreError, CoreResult};
pub use geo::*;
pub use route::*;
pub use status::*;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Backend order number, the only input needed to track an order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a user-supplied order number, rejecting blank input
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(CoreError::invalid_order_number(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Customer the order belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn parse(raw: &str) -> CoreResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::invalid_user_id(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// ORDER DETAILS
// ============================================================================

/// One line of the order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

/// Where the order is delivered to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub address_line: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

/// Restaurant preparing the order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantInfo {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

/// Payment and coupon breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentBreakdown {
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub taxes: f64,
    pub discount: f64,
    pub coupon_code: Option<String>,
    pub total: f64,
    pub method: Option<String>,
}

/// Order record as returned by the order-details endpoint.
///
/// Replaced wholesale on every successful fetch, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub order_number: OrderNumber,
    pub placed_on: DateTime<Utc>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub delivery_address: DeliveryAddress,
    #[serde(default)]
    pub restaurant: RestaurantInfo,
    #[serde(default)]
    pub payment: PaymentBreakdown,
    /// Raw backend status string, classified by [`DeliveryStatus::classify`]
    pub status: String,
}

impl OrderSnapshot {
    pub fn new(order_number: OrderNumber, status: impl Into<String>) -> Self {
        Self {
            order_number,
            placed_on: Utc::now(),
            estimated_delivery: None,
            items: Vec::new(),
            delivery_address: DeliveryAddress::default(),
            restaurant: RestaurantInfo::default(),
            payment: PaymentBreakdown::default(),
            status: status.into(),
        }
    }

    /// Canonical status of this record
    pub fn delivery_status(&self) -> DeliveryStatus {
        DeliveryStatus::classify(&self.status)
    }

    /// Minutes between placing the order and the promised delivery time
    pub fn promised_minutes(&self) -> Option<i64> {
        self.estimated_delivery
            .map(|eta| eta.signed_duration_since(self.placed_on).num_minutes().max(0))
    }
}

// ============================================================================
// LIVE LOCATION
// ============================================================================

/// Courier details for the call button
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPartner {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Live-location feed record, replaced wholesale on every successful poll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveTrackingSnapshot {
    pub restaurant_location: Option<GeoPoint>,
    pub user_destination: Option<GeoPoint>,
    pub agent_location: Option<GeoPoint>,
    pub estimated_minutes: Option<f64>,
    pub agent_assign_status: Option<String>,
    pub delivery_partner: Option<DeliveryPartner>,
}

impl LiveTrackingSnapshot {
    /// Courier assignment reported by the feed
    pub fn assignment(&self) -> AgentAssignment {
        AgentAssignment::classify(self.agent_assign_status.as_deref())
    }

    /// Courier position, only once a courier is assigned
    pub fn agent(&self) -> Option<&GeoPoint> {
        if self.assignment().has_agent() {
            self.agent_location.as_ref()
        } else {
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
