//! Cancellable polling and single-flight fetch guards

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// At most one fetch of a kind in flight; late arrivals are dropped, not queued
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` when a fetch is already outstanding
    pub fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { flight: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the slot on drop
#[derive(Debug)]
pub struct FlightGuard<'a> {
    flight: &'a SingleFlight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flight.busy.store(false, Ordering::Release);
    }
}

/// Repeating task that runs `tick` every `period` until stopped.
///
/// The first tick fires one full period after spawning. A tick that is
/// already running when [`PollScheduler::stop`] is called runs to completion;
/// no further tick starts.
pub struct PollScheduler {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollScheduler {
    /// Spawn the polling loop. `tick` returns `None` to end the loop from inside.
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Option<Fut> + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(fut) = tick() else { break };
                        fut.await;
                    }
                }
            }

            debug!("Poll loop exited");
        });

        Self { token, handle }
    }

    /// Cancel the timer. Idempotent.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The loop task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_single_flight_rejects_second_claim() {
        let flight = SingleFlight::new();

        let guard = flight.try_acquire();
        assert!(guard.is_some());
        assert!(flight.is_busy());
        assert!(flight.try_acquire().is_none());

        drop(guard);
        assert!(!flight.is_busy());
        assert!(flight.try_acquire().is_some());
    }

    fn counting_scheduler(period: Duration) -> (PollScheduler, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let scheduler = PollScheduler::spawn(period, move || {
            let counter = counter.clone();
            Some(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        (scheduler, ticks)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_period() {
        let (scheduler, ticks) = counting_scheduler(Duration::from_secs(60));

        time::sleep(Duration::from_secs(59)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_halts_ticks() {
        let (scheduler, ticks) = counting_scheduler(Duration::from_secs(60));

        time::sleep(Duration::from_secs(61)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        scheduler.stop();
        scheduler.stop();
        assert!(scheduler.is_stopped());

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_returning_none_ends_loop() {
        let scheduler = PollScheduler::spawn(Duration::from_secs(1), || None::<std::future::Ready<()>>);

        time::sleep(Duration::from_secs(2)).await;
        assert!(scheduler.is_finished());
        assert!(!scheduler.is_stopped());
    }
}
