//! Error types for tracking sessions

use order_core::OrderNumber;
use thiserror::Error;

/// Failure reported by an order or live-location collaborator.
///
/// Every variant is recovered by the session: the last good snapshot stays
/// in place and the error flag is raised.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected HTTP status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Order not found: {0}")]
    NotFound(String),
}

impl FetchError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn not_found(order: impl Into<String>) -> Self {
        Self::NotFound(order.into())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Misuse of the session lifecycle
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Tracking already started for order {0}")]
    AlreadyStarted(OrderNumber),

    #[error("Tracking stopped for order {0}")]
    Stopped(OrderNumber),

    #[error("Order {0} is tracked for a different user")]
    UserMismatch(OrderNumber),
}

pub type TrackerResult<T> = Result<T, TrackerError>;
