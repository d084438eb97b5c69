//! Sessions keyed by order number

use crate::error::{TrackerError, TrackerResult};
use crate::session::{Collaborators, TrackingSession};
use crate::TrackerConfig;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use order_core::{OrderNumber, UserId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One tracking session per order, shared by every consumer watching it
pub struct SessionRegistry {
    sessions: DashMap<OrderNumber, Arc<TrackingSession>>,
    config: TrackerConfig,
    collaborators: Collaborators,
}

impl SessionRegistry {
    pub fn new(config: TrackerConfig, collaborators: Collaborators) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            collaborators,
        }
    }

    /// Return the session for `order_number`, creating and starting it if needed.
    ///
    /// An existing session is only handed to the user it was created for.
    pub async fn track(
        &self,
        order_number: OrderNumber,
        user_id: UserId,
    ) -> TrackerResult<Arc<TrackingSession>> {
        let (session, created) = match self.sessions.entry(order_number.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let session = Arc::new(TrackingSession::new(
                    order_number.clone(),
                    user_id.clone(),
                    self.config.clone(),
                    self.collaborators.clone(),
                ));
                entry.insert(session.clone());
                (session, true)
            }
        };

        if !created {
            if session.user_id() != &user_id {
                warn!(order = %order_number, "Tracking requested by a different user, refusing");
                return Err(TrackerError::UserMismatch(order_number));
            }
            debug!(order = %order_number, "Reusing tracking session");
            return Ok(session);
        }

        self.update_gauge();
        info!(order = %order_number, total = self.sessions.len(), "Tracking session registered");

        session.start().await?;
        Ok(session)
    }

    pub fn get(&self, order_number: &OrderNumber) -> Option<Arc<TrackingSession>> {
        self.sessions.get(order_number).map(|entry| entry.value().clone())
    }

    /// Stop and forget a session
    pub fn untrack(&self, order_number: &OrderNumber) -> bool {
        let Some((_, session)) = self.sessions.remove(order_number) else {
            return false;
        };

        session.stop();
        self.update_gauge();
        info!(order = %order_number, "Tracking session removed");
        true
    }

    /// Drop sessions that are terminal or stopped. Returns how many were removed.
    pub fn prune_terminal(&self) -> usize {
        let mut removed = 0;
        self.sessions.retain(|_, session| {
            let keep = !(session.is_terminal() || session.is_stopped());
            if !keep {
                session.stop();
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            self.update_gauge();
            info!(removed, remaining = self.sessions.len(), "Pruned finished tracking sessions");
        }
        removed
    }

    /// Stop every session, used on shutdown
    pub fn stop_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().stop();
        }
        self.sessions.clear();
        self.update_gauge();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn update_gauge(&self) {
        if let Some(metrics) = &self.collaborators.metrics {
            metrics.set_active_sessions(self.sessions.len() as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::{MockLiveLocationFetcher, MockOrderFetcher};
    use crate::session::SessionPhase;
    use order_core::{LiveTrackingSnapshot, OrderSnapshot};

    fn registry(orders: MockOrderFetcher, live: MockLiveLocationFetcher) -> SessionRegistry {
        SessionRegistry::new(
            TrackerConfig::default(),
            Collaborators::new(Arc::new(orders), Arc::new(live)),
        )
    }

    #[tokio::test]
    async fn test_track_reuses_session() {
        let mut orders = MockOrderFetcher::new();
        orders
            .expect_fetch_order_details()
            .times(1)
            .returning(|number, _| Ok(OrderSnapshot::new(number.clone(), "preparing")));
        let mut live = MockLiveLocationFetcher::new();
        live.expect_fetch_live_location()
            .times(1)
            .returning(|_| Ok(LiveTrackingSnapshot::default()));

        let registry = registry(orders, live);
        let first = registry
            .track(OrderNumber::new("ORD-1"), UserId::new("u"))
            .await
            .unwrap();
        let second = registry
            .track(OrderNumber::new("ORD-1"), UserId::new("u"))
            .await
            .unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(registry.len(), 1);
        assert_eq!(first.phase(), SessionPhase::Active);

        assert!(registry.untrack(&OrderNumber::new("ORD-1")));
        assert!(first.is_stopped());
        assert!(registry.is_empty());
        assert!(!registry.untrack(&OrderNumber::new("ORD-1")));
    }

    #[tokio::test]
    async fn test_track_refuses_other_user() {
        let mut orders = MockOrderFetcher::new();
        orders
            .expect_fetch_order_details()
            .withf(|_, user| user.as_str() == "owner")
            .times(1)
            .returning(|number, _| Ok(OrderSnapshot::new(number.clone(), "preparing")));
        let mut live = MockLiveLocationFetcher::new();
        live.expect_fetch_live_location()
            .times(1)
            .returning(|_| Ok(LiveTrackingSnapshot::default()));

        let registry = registry(orders, live);
        let owned = registry
            .track(OrderNumber::new("ORD-1"), UserId::new("owner"))
            .await
            .unwrap();

        let refused = registry
            .track(OrderNumber::new("ORD-1"), UserId::new("stranger"))
            .await;

        assert!(matches!(refused, Err(TrackerError::UserMismatch(_))));
        assert_eq!(owned.user_id().as_str(), "owner");
        assert!(!owned.is_stopped());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_prune_removes_terminal_sessions() {
        let mut orders = MockOrderFetcher::new();
        orders.expect_fetch_order_details().returning(|number, _| {
            let status = if number.as_str() == "ORD-DONE" { "delivered" } else { "confirmed" };
            Ok(OrderSnapshot::new(number.clone(), status))
        });
        let mut live = MockLiveLocationFetcher::new();
        live.expect_fetch_live_location()
            .returning(|_| Err(FetchError::transport("timeout")));

        let registry = registry(orders, live);
        registry
            .track(OrderNumber::new("ORD-DONE"), UserId::new("u"))
            .await
            .unwrap();
        let pending = registry
            .track(OrderNumber::new("ORD-LIVE"), UserId::new("u"))
            .await
            .unwrap();

        assert_eq!(pending.phase(), SessionPhase::Loading);
        assert!(pending.has_error());

        assert_eq!(registry.prune_terminal(), 1);
        assert!(registry.get(&OrderNumber::new("ORD-DONE")).is_none());
        assert!(registry.get(&OrderNumber::new("ORD-LIVE")).is_some());

        registry.stop_all();
        assert!(registry.is_empty());
        assert!(pending.is_stopped());
    }
}
