use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::checks::CheckSet;
use crate::metrics::MetricsAggregator;
use crate::scenario::{IterationContext, Scenario};
use crate::signal::StopSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display, strum::FromRepr)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum VuState {
    /// Spawned, first iteration not started yet.
    Idle = 0,
    Running = 1,
    /// Asked to stop; finishing the current iteration.
    Stopping = 2,
    Stopped = 3,
}

/// State shared between a virtual user task and the pool that owns it.
#[derive(Debug)]
pub(crate) struct VuShared {
    id: u64,
    state: AtomicU8,
    in_iteration: AtomicBool,
    stop: StopSignal,
}

impl VuShared {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            state: AtomicU8::new(VuState::Idle as u8),
            in_iteration: AtomicBool::new(false),
            stop: StopSignal::new(),
        }
    }

    pub(crate) fn state(&self) -> VuState {
        VuState::from_repr(self.state.load(Ordering::Acquire)).unwrap_or(VuState::Stopped)
    }

    /// Moves the state forward only. Returns whether it changed.
    fn advance(&self, to: VuState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (cur < to as u8).then_some(to as u8)
            })
            .is_ok()
    }

    pub(crate) fn request_stop(&self) {
        self.advance(VuState::Stopping);
        self.stop.stop();
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.is_stopped()
    }

    pub(crate) fn in_iteration(&self) -> bool {
        self.in_iteration.load(Ordering::Acquire)
    }
}

/// Keeps the live-VU gauge and the `Stopped` state correct even if the task is aborted
/// or the scenario panics.
struct LiveGuard<'a> {
    vu: &'a VuShared,
    metrics: &'a MetricsAggregator,
}

impl<'a> LiveGuard<'a> {
    fn enter(vu: &'a VuShared, metrics: &'a MetricsAggregator) -> Self {
        metrics.vu_started();
        Self { vu, metrics }
    }
}

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.vu.in_iteration.store(false, Ordering::Release);
        self.vu.advance(VuState::Stopped);
        self.metrics.vu_stopped();
    }
}

/// Iterates the scenario until the stop signal is observed.
///
/// The signal is checked between iterations and raced against think time. An iteration
/// that has started always runs to completion unless the task is aborted.
pub(crate) async fn run_vu<S: Scenario>(
    vu: Arc<VuShared>,
    scenario: Arc<S>,
    checks: Arc<CheckSet>,
    metrics: Arc<MetricsAggregator>,
) {
    let _live = LiveGuard::enter(&vu, &metrics);
    let mut iteration = 0u64;

    loop {
        if vu.stop_requested() {
            break;
        }
        vu.advance(VuState::Running);

        let ctx = IterationContext {
            vu_id: vu.id,
            iteration,
        };
        vu.in_iteration.store(true, Ordering::Release);
        let outcome = scenario.run(&ctx).await;
        let results = checks.evaluate(&outcome);
        metrics.record(vu.id, &outcome, &results);
        vu.in_iteration.store(false, Ordering::Release);
        iteration += 1;

        let pause = scenario.think_time().sample();
        if pause.is_zero() {
            // Without a pause an always-ready scenario would never yield.
            tokio::task::yield_now().await;
            continue;
        }

        tokio::select! {
            biased;
            _ = vu.stop.stopped() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    vu.advance(VuState::Stopping);
    tracing::trace!(vu_id = vu.id, iterations = iteration, "virtual user finished");
}
