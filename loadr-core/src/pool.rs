use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};

use crate::checks::CheckSet;
use crate::metrics::{AnomalyKind, MetricsAggregator};
use crate::scenario::Scenario;
use crate::vu::{VuShared, run_vu};

pub(crate) struct VuHandle {
    shared: Arc<VuShared>,
    task: JoinHandle<()>,
}

/// Virtual users of one run, keyed by id. Only the controller touches it.
pub(crate) struct VuPool<S> {
    scenario: Arc<S>,
    checks: Arc<CheckSet>,
    metrics: Arc<MetricsAggregator>,
    vus: BTreeMap<u64, VuHandle>,
    next_id: u64,
}

impl<S: Scenario> VuPool<S> {
    pub(crate) fn new(
        scenario: Arc<S>,
        checks: Arc<CheckSet>,
        metrics: Arc<MetricsAggregator>,
    ) -> Self {
        Self {
            scenario,
            checks,
            metrics,
            vus: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Users that have not been asked to stop.
    pub(crate) fn active(&self) -> u64 {
        self.vus
            .values()
            .filter(|h| !h.shared.stop_requested())
            .count() as u64
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.vus.len()
    }

    #[cfg(test)]
    pub(crate) fn state_of(&self, id: u64) -> Option<crate::vu::VuState> {
        self.vus.get(&id).map(|h| h.shared.state())
    }

    fn spawn_one(&mut self) {
        let id = self.next_id;
        self.next_id += 1;

        let shared = Arc::new(VuShared::new(id));
        let task = tokio::spawn(run_vu(
            Arc::clone(&shared),
            Arc::clone(&self.scenario),
            Arc::clone(&self.checks),
            Arc::clone(&self.metrics),
        ));
        self.vus.insert(id, VuHandle { shared, task });
    }

    /// Grows or shrinks the set of active users to `target`.
    ///
    /// Shrinking signals the newest users first and leaves their current iteration to
    /// finish on its own.
    pub(crate) fn scale_to(&mut self, target: u64) {
        let active = self.active();
        if target > active {
            for _ in active..target {
                self.spawn_one();
            }
            tracing::debug!(from = active, to = target, "spawned virtual users");
        } else if target < active {
            let excess = (active - target) as usize;
            let victims = self
                .vus
                .values()
                .rev()
                .filter(|h| !h.shared.stop_requested())
                .take(excess);
            for h in victims {
                h.shared.request_stop();
            }
            tracing::debug!(from = active, to = target, "stopping virtual users");
        }
    }

    /// Drops users whose task has ended. A panicked task is logged and forgotten.
    pub(crate) async fn reap(&mut self) {
        let finished: Vec<u64> = self
            .vus
            .iter()
            .filter(|(_, h)| h.task.is_finished())
            .map(|(id, _)| *id)
            .collect();

        for id in finished {
            if let Some(handle) = self.vus.remove(&id) {
                log_join(id, handle.task.await);
            }
        }
    }

    /// Signals every user, waits up to `grace` for them to stop, then aborts the rest.
    ///
    /// Returns how many users had to be aborted.
    pub(crate) async fn drain(&mut self, grace: Duration) -> usize {
        for h in self.vus.values() {
            h.shared.request_stop();
        }

        let mut joined = Vec::with_capacity(self.vus.len());
        let wait_all = async {
            for (id, h) in self.vus.iter_mut() {
                log_join(*id, (&mut h.task).await);
                joined.push(*id);
            }
        };
        let _ = tokio::time::timeout(grace, wait_all).await;
        for id in joined {
            self.vus.remove(&id);
        }

        let mut forced = 0;
        for (id, h) in std::mem::take(&mut self.vus) {
            if h.task.is_finished() {
                log_join(id, h.task.await);
                continue;
            }

            if h.shared.in_iteration() {
                self.metrics.record_interrupted();
            }
            h.task.abort();
            self.metrics
                .record_anomaly(id, AnomalyKind::GracePeriodExceeded);
            tracing::warn!(
                vu_id = id,
                state = %h.shared.state(),
                grace_period = ?grace,
                "virtual user did not stop within the grace period; aborted"
            );
            forced += 1;

            // Wait for the cancellation to land so the live gauge is settled.
            let _ = h.task.await;
        }

        forced
    }
}

fn log_join(id: u64, result: Result<(), JoinError>) {
    match result {
        Ok(()) => {}
        Err(err) if err.is_panic() => {
            tracing::warn!(vu_id = id, "virtual user panicked");
        }
        Err(err) => tracing::debug!(vu_id = id, error = %err, "virtual user task ended"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::outcome::IterationOutcome;
    use crate::scenario::{FnScenario, IterationContext, ThinkTime};
    use crate::vu::VuState;

    fn pool_with_think(think: Duration) -> VuPool<impl Scenario> {
        let scenario = FnScenario::new(|_ctx: IterationContext| {
            std::future::ready(IterationOutcome::default())
        })
        .with_think_time(ThinkTime::Fixed(think));
        VuPool::new(
            Arc::new(scenario),
            Arc::new(CheckSet::new()),
            Arc::new(MetricsAggregator::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn ids_are_sequential_and_shrink_is_newest_first() {
        let mut pool = pool_with_think(Duration::from_millis(100));

        pool.scale_to(4);
        assert_eq!(pool.active(), 4);
        tokio::time::sleep(Duration::from_millis(10)).await;

        pool.scale_to(2);
        assert_eq!(pool.active(), 2);
        assert_eq!(pool.state_of(1), Some(VuState::Running));
        assert_eq!(pool.state_of(2), Some(VuState::Running));
        assert!(matches!(
            pool.state_of(4),
            Some(VuState::Stopping | VuState::Stopped)
        ));

        tokio::time::sleep(Duration::from_millis(10)).await;
        pool.reap().await;
        assert_eq!(pool.len(), 2);

        pool.scale_to(3);
        assert_eq!(pool.state_of(5), Some(VuState::Idle));
        assert_eq!(pool.state_of(3), None);

        assert_eq!(pool.drain(Duration::from_secs(1)).await, 0);
        assert_eq!(pool.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_aborts_users_stuck_past_the_grace_period() {
        let metrics = Arc::new(MetricsAggregator::new());
        let scenario = FnScenario::new(|_ctx: IterationContext| async {
            std::future::pending::<()>().await;
            IterationOutcome::default()
        });
        let mut pool = VuPool::new(
            Arc::new(scenario),
            Arc::new(CheckSet::new()),
            Arc::clone(&metrics),
        );

        pool.scale_to(2);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.state_of(2), Some(VuState::Running));

        let started = tokio::time::Instant::now();
        let forced = pool.drain(Duration::from_secs(2)).await;
        assert_eq!(forced, 2);
        assert!(started.elapsed() < Duration::from_millis(2_100));

        let snap = metrics.snapshot();
        assert_eq!(snap.anomalies.len(), 2);
        assert_eq!(snap.iterations_interrupted, 2);
        assert_eq!(snap.iterations_total, 0);
        assert_eq!(snap.vus_active, 0);
    }
}
