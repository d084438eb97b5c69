//! Error types for the order tracking domain

use thiserror::Error;

/// Core error type for order tracking
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid order number: {0:?}")]
    InvalidOrderNumber(String),

    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),
}

impl CoreError {
    pub fn invalid_order_number(raw: impl Into<String>) -> Self {
        Self::InvalidOrderNumber(raw.into())
    }

    pub fn invalid_user_id(raw: impl Into<String>) -> Self {
        Self::InvalidUserId(raw.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
