//! Client construction errors

use thiserror::Error;

/// Errors raised while building the HTTP client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("HTTP client error: {0}")]
    Build(#[from] reqwest::Error),
}

impl ClientError {
    pub fn invalid_base_url(msg: impl Into<String>) -> Self {
        Self::InvalidBaseUrl(msg.into())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
