//! Delivery status classification
//!
//! The backend emits free-form status strings. They are folded into the
//! canonical [`DeliveryStatus`] through an explicit lookup table; anything
//! the table does not know about fails closed to [`DeliveryStatus::Pending`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical delivery status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Ordered,
    Confirmed,
    Preparing,
    ReadyForPickup,
    OnTheWay,
    Delivered,
    Cancelled,
    Refunded,
}

/// Backend spelling (normalized) to canonical status
const STATUS_TABLE: &[(&str, DeliveryStatus)] = &[
    ("pending", DeliveryStatus::Pending),
    ("ordered", DeliveryStatus::Pending),
    ("confirmed", DeliveryStatus::Confirmed),
    ("preparing", DeliveryStatus::Preparing),
    ("ready", DeliveryStatus::ReadyForPickup),
    ("ready for delivery", DeliveryStatus::ReadyForPickup),
    ("ready for pickup", DeliveryStatus::ReadyForPickup),
    ("on the way", DeliveryStatus::OnTheWay),
    ("out for delivery", DeliveryStatus::OnTheWay),
    ("delivered", DeliveryStatus::Delivered),
    ("cancelled", DeliveryStatus::Cancelled),
    ("refunded", DeliveryStatus::Refunded),
];

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 9] = [
        DeliveryStatus::Pending,
        DeliveryStatus::Ordered,
        DeliveryStatus::Confirmed,
        DeliveryStatus::Preparing,
        DeliveryStatus::ReadyForPickup,
        DeliveryStatus::OnTheWay,
        DeliveryStatus::Delivered,
        DeliveryStatus::Cancelled,
        DeliveryStatus::Refunded,
    ];

    /// Classify a raw backend status string. Never fails.
    pub fn classify(raw: &str) -> Self {
        let normalized = normalize(raw);
        STATUS_TABLE
            .iter()
            .find(|(spelling, _)| *spelling == normalized)
            .map(|(_, status)| *status)
            .unwrap_or(DeliveryStatus::Pending)
    }

    /// Whether `raw` is one of the known backend spellings
    pub fn is_recognized(raw: &str) -> bool {
        let normalized = normalize(raw);
        STATUS_TABLE.iter().any(|(spelling, _)| *spelling == normalized)
    }

    /// No tracking updates are expected after a terminal status
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered | DeliveryStatus::Cancelled | DeliveryStatus::Refunded
        )
    }

    /// Presentation metadata for the progress bar
    pub fn metadata(self) -> StatusMeta {
        let (step, color_token, icon_token, description) = match self {
            DeliveryStatus::Pending => (0, "warning", "clock", "Waiting for the restaurant to accept your order"),
            DeliveryStatus::Ordered => (0, "warning", "receipt", "Your order has been placed"),
            DeliveryStatus::Confirmed => (1, "info", "check-circle", "The restaurant confirmed your order"),
            DeliveryStatus::Preparing => (1, "info", "chef-hat", "Your food is being prepared"),
            DeliveryStatus::ReadyForPickup => (2, "primary", "package", "Your order is packed and waiting for pickup"),
            DeliveryStatus::OnTheWay => (3, "primary", "bike", "Your delivery partner is on the way"),
            DeliveryStatus::Delivered => (4, "success", "home", "Your order has been delivered"),
            DeliveryStatus::Cancelled => (0, "error", "x-circle", "This order was cancelled"),
            DeliveryStatus::Refunded => (0, "neutral", "wallet", "This order was refunded"),
        };

        StatusMeta {
            step,
            color_token,
            icon_token,
            description,
        }
    }

    /// Position on the 0-4 progress scale
    pub fn step(self) -> u8 {
        self.metadata().step
    }
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "PENDING"),
            DeliveryStatus::Ordered => write!(f, "ORDERED"),
            DeliveryStatus::Confirmed => write!(f, "CONFIRMED"),
            DeliveryStatus::Preparing => write!(f, "PREPARING"),
            DeliveryStatus::ReadyForPickup => write!(f, "READY_FOR_PICKUP"),
            DeliveryStatus::OnTheWay => write!(f, "ON_THE_WAY"),
            DeliveryStatus::Delivered => write!(f, "DELIVERED"),
            DeliveryStatus::Cancelled => write!(f, "CANCELLED"),
            DeliveryStatus::Refunded => write!(f, "REFUNDED"),
        }
    }
}

/// Presentation tokens for one status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMeta {
    pub step: u8,
    pub color_token: &'static str,
    pub icon_token: &'static str,
    pub description: &'static str,
}

/// Courier assignment reported by the live-location feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentAssignment {
    Unassigned,
    Assigned,
    Delivered,
}

impl AgentAssignment {
    /// Classify the feed's `agentAssignStatus`; missing or unknown is unassigned
    pub fn classify(raw: Option<&str>) -> Self {
        match raw.map(normalize).as_deref() {
            Some("assigned") => AgentAssignment::Assigned,
            Some("delivered") => AgentAssignment::Delivered,
            _ => AgentAssignment::Unassigned,
        }
    }

    /// A courier exists for the order
    pub fn has_agent(self) -> bool {
        !matches!(self, AgentAssignment::Unassigned)
    }

    /// Status the feed pushes the order into, if any
    pub fn implied_status(self) -> Option<DeliveryStatus> {
        match self {
            AgentAssignment::Unassigned => None,
            AgentAssignment::Assigned => Some(DeliveryStatus::OnTheWay),
            AgentAssignment::Delivered => Some(DeliveryStatus::Delivered),
        }
    }
}

/// Lowercase, treat `_`/`-` as spaces and collapse runs of whitespace
fn normalize(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
