//! Cancellable periodic driver for reconcilers

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::report::SweepReport;

/// One reconciliation pass over remote state
///
/// Implementations log and count every error; a pass never fails as a whole.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn run_once(&self) -> SweepReport;
}

/// Runs a reconciler immediately and then once per period until cancelled
///
/// A pass that overruns the period delays the next one instead of stacking.
pub struct PeriodicTask {
    reconciler: Arc<dyn Reconciler>,
    period: Duration,
}

impl PeriodicTask {
    pub fn new(reconciler: Arc<dyn Reconciler>, period: Duration) -> Self {
        Self { reconciler, period }
    }

    /// Loop until `shutdown` fires, returning the number of completed passes
    ///
    /// Cancellation also interrupts a pass in flight.
    pub async fn run(self, shutdown: CancellationToken) -> usize {
        let name = self.reconciler.name();
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut completed = 0;

        info!("Starting {} reconciler (every {:?})", name, self.period);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("{} pass interrupted by shutdown", name);
                    break;
                }
                report = self.reconciler.run_once() => {
                    completed += 1;
                    info!("{} pass finished: {}", name, report);
                }
            }
        }

        info!("{} reconciler stopped after {} pass(es)", name, completed);
        completed
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<usize> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        passes: AtomicUsize,
        pass_duration: Duration,
    }

    impl Counting {
        fn new(pass_duration: Duration) -> Arc<Self> {
            Arc::new(Self {
                passes: AtomicUsize::new(0),
                pass_duration,
            })
        }
    }

    #[async_trait]
    impl Reconciler for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run_once(&self) -> SweepReport {
            self.passes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.pass_duration).await;
            SweepReport::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_period() {
        let counting = Counting::new(Duration::ZERO);
        let shutdown = CancellationToken::new();
        let handle =
            PeriodicTask::new(counting.clone(), Duration::from_secs(10)).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.cancel();

        // Passes at t=0, 10 and 20
        assert_eq!(handle.await.unwrap(), 3);
        assert_eq!(counting.passes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pass_in_flight() {
        let counting = Counting::new(Duration::from_secs(3600));
        let shutdown = CancellationToken::new();
        let handle =
            PeriodicTask::new(counting.clone(), Duration::from_secs(10)).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.cancel();

        assert_eq!(handle.await.unwrap(), 0);
        assert_eq!(counting.passes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_runs_nothing() {
        let counting = Counting::new(Duration::ZERO);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let completed = PeriodicTask::new(counting.clone(), Duration::from_secs(10))
            .run(shutdown)
            .await;

        assert_eq!(completed, 0);
        assert_eq!(counting.passes.load(Ordering::SeqCst), 0);
    }
}
