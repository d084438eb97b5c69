//! Collaborator seams for the two polled data sources

use crate::error::FetchResult;
use async_trait::async_trait;
use order_core::{LiveTrackingSnapshot, OrderNumber, OrderSnapshot, UserId};
use std::fmt;

/// Which collaborator a fetch went to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    OrderDetails,
    LiveLocation,
}

impl FetchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchKind::OrderDetails => "order_details",
            FetchKind::LiveLocation => "live_location",
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of order records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderFetcher: Send + Sync {
    async fn fetch_order_details(
        &self,
        order_number: &OrderNumber,
        user_id: &UserId,
    ) -> FetchResult<OrderSnapshot>;
}

/// Source of live courier positions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiveLocationFetcher: Send + Sync {
    async fn fetch_live_location(
        &self,
        order_number: &OrderNumber,
    ) -> FetchResult<LiveTrackingSnapshot>;
}
