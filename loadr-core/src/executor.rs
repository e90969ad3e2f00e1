use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::checks::CheckSet;
use crate::config::{TestPlan, TrafficProfile};
use crate::error::{ConfigError, Result};
use crate::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::pool::VuPool;
use crate::progress::{ProgressFn, ProgressTracker};
use crate::ramp::RampSchedule;
use crate::scenario::Scenario;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr, strum::FromRepr,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum ExecutorState {
    Configuring = 0,
    Running = 1,
    Draining = 2,
    Completed = 3,
}

#[derive(Debug, Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ExecutorState::Configuring as u8)))
    }

    fn get(&self) -> ExecutorState {
        ExecutorState::from_repr(self.0.load(Ordering::Acquire))
            .unwrap_or(ExecutorState::Completed)
    }

    fn set(&self, state: ExecutorState) {
        self.0.store(state as u8, Ordering::Release);
        tracing::info!(state = %state, "executor state changed");
    }
}

/// Cheap handle for observing a run from other tasks.
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    state: SharedState,
    metrics: Arc<MetricsAggregator>,
}

impl ExecutorHandle {
    pub fn state(&self) -> ExecutorState {
        self.state.get()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Drives one load test: `Configuring → Running → Draining → Completed`.
pub struct Executor<S> {
    plan: TestPlan,
    scenario: Arc<S>,
    checks: Arc<CheckSet>,
    metrics: Arc<MetricsAggregator>,
    state: SharedState,
    progress: Option<ProgressFn>,
}

impl<S: Scenario> Executor<S> {
    pub fn new(plan: TestPlan, scenario: S) -> Self {
        Self {
            plan,
            scenario: Arc::new(scenario),
            checks: Arc::new(CheckSet::new()),
            metrics: Arc::new(MetricsAggregator::new()),
            state: SharedState::new(),
            progress: None,
        }
    }

    #[must_use]
    pub fn with_checks(mut self, checks: CheckSet) -> Self {
        self.checks = Arc::new(checks);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> ExecutorState {
        self.state.get()
    }

    pub fn metrics(&self) -> Arc<MetricsAggregator> {
        Arc::clone(&self.metrics)
    }

    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle {
            state: self.state.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Runs the test to completion and returns the final snapshot.
    ///
    /// Only configuration problems fail the run. Request errors, failed checks and
    /// forced stops are reported in the snapshot.
    pub async fn run(self) -> Result<MetricsSnapshot> {
        self.plan.validate()?;
        self.scenario.validate()?;

        let schedule = RampSchedule::new(&self.plan.profile);
        let total = schedule.total_duration();
        let mut pool = VuPool::new(
            Arc::clone(&self.scenario),
            Arc::clone(&self.checks),
            Arc::clone(&self.metrics),
        );

        let started = Instant::now();
        let deadline = started
            .checked_add(total)
            .ok_or(ConfigError::DurationTooLong(total))?;
        self.metrics.mark_started(started);
        tracing::info!(
            total_duration = ?total,
            peak_vus = schedule.peak_target(),
            tick = ?self.plan.tick,
            checks = self.checks.len(),
            "load test started"
        );
        self.state.set(ExecutorState::Running);

        let progress_handle = self.progress.as_ref().map(|progress| {
            let progress = Arc::clone(progress);
            let metrics = Arc::clone(&self.metrics);
            let state = self.state.clone();
            let flat_vus = match self.plan.profile {
                TrafficProfile::Flat { vus, .. } => Some(vus),
                TrafficProfile::Staged { .. } => None,
            };
            let mut tracker = ProgressTracker::new(schedule.clone(), flat_vus);
            tokio::spawn(async move {
                let mut interval =
                    tokio::time::interval_at(Instant::now() + PROGRESS_INTERVAL, PROGRESS_INTERVAL);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    (progress)(tracker.update(state.get(), metrics.snapshot()));
                }
            })
        });

        let mut interval = tokio::time::interval(self.plan.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }

            let elapsed = started.elapsed();
            let target = schedule.target_at(elapsed);
            pool.reap().await;
            if target == 0 && schedule.is_done(elapsed) {
                break;
            }
            pool.scale_to(target);
        }

        self.state.set(ExecutorState::Draining);
        let forced = pool.drain(self.plan.grace_period).await;
        self.metrics.mark_finished();

        if let Some(h) = progress_handle {
            h.abort();
            if let Err(err) = h.await
                && err.is_panic()
            {
                tracing::warn!("progress reporter panicked; live progress stopped early");
            }
        }

        let snapshot = self.metrics.snapshot();
        self.state.set(ExecutorState::Completed);
        tracing::info!(
            elapsed = ?snapshot.elapsed,
            requests = snapshot.requests_total,
            iterations = snapshot.iterations_total,
            forced_stops = forced,
            "load test completed"
        );
        Ok(snapshot)
    }
}

/// Runs `scenario` under `plan` without checks and returns the final snapshot.
pub async fn run<S: Scenario>(plan: TestPlan, scenario: S) -> Result<MetricsSnapshot> {
    Executor::new(plan, scenario).run().await
}
