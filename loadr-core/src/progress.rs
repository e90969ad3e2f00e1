use std::sync::Arc;
use std::time::Duration;

use loadr_metrics::{CounterSnapshot, RunningStats};

use crate::executor::ExecutorState;
use crate::metrics::MetricsSnapshot;
use crate::ramp::{RampSchedule, StageSnapshot};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveMetrics {
    /// Requests/sec observed during the last progress interval.
    pub rps_now: f64,
    /// Failed requests/sec observed during the last progress interval.
    pub failed_rps_now: f64,
    /// Failed / total requests during the last progress interval (0..=1).
    pub error_rate_now: f64,
    pub iterations_per_sec_now: f64,

    /// Requests/sec statistics across progress intervals.
    pub req_per_sec_avg: f64,
    pub req_per_sec_stdev: f64,
    pub req_per_sec_max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileProgress {
    Flat { vus: u64, duration: Duration },
    Staged {
        total_duration: Duration,
        stage: Option<StageSnapshot>,
    },
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// 1-based.
    pub tick: u64,
    pub elapsed: Duration,
    pub state: ExecutorState,
    pub target_vus: u64,
    /// Users whose task is still alive, stopping ones included.
    pub active_vus: u64,
    pub profile: ProfileProgress,
    pub live: LiveMetrics,
    pub snapshot: MetricsSnapshot,
}

pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, Default)]
struct LastTotals {
    at: Duration,
    requests: CounterSnapshot,
    failed: CounterSnapshot,
    iterations: CounterSnapshot,
}

/// Turns successive snapshots into per-interval rates.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    schedule: RampSchedule,
    flat_vus: Option<u64>,
    tick: u64,
    last: Option<LastTotals>,
    rps: RunningStats,
}

impl ProgressTracker {
    pub(crate) fn new(schedule: RampSchedule, flat_vus: Option<u64>) -> Self {
        Self {
            schedule,
            flat_vus,
            tick: 0,
            last: None,
            rps: RunningStats::default(),
        }
    }

    pub(crate) fn update(&mut self, state: ExecutorState, snapshot: MetricsSnapshot) -> ProgressUpdate {
        self.tick = self.tick.saturating_add(1);
        let elapsed = snapshot.elapsed;

        let now = LastTotals {
            at: elapsed,
            requests: CounterSnapshot::new(snapshot.requests_total),
            failed: CounterSnapshot::new(snapshot.requests_failed),
            iterations: CounterSnapshot::new(snapshot.iterations_total),
        };
        let prev = self.last.replace(now);
        let dt = elapsed
            .saturating_sub(prev.map(|p| p.at).unwrap_or(Duration::ZERO))
            .as_secs_f64();

        let delta_requests = now.requests.delta_since(prev.map(|p| p.requests));
        let delta_failed = now.failed.delta_since(prev.map(|p| p.failed));
        let rps_now = now.requests.per_sec_since(prev.map(|p| p.requests), dt);
        self.rps.push(rps_now);

        let live = LiveMetrics {
            rps_now,
            failed_rps_now: now.failed.per_sec_since(prev.map(|p| p.failed), dt),
            error_rate_now: if delta_requests == 0 {
                0.0
            } else {
                delta_failed as f64 / delta_requests as f64
            },
            iterations_per_sec_now: now
                .iterations
                .per_sec_since(prev.map(|p| p.iterations), dt),
            req_per_sec_avg: self.rps.mean(),
            req_per_sec_stdev: self.rps.stdev(),
            req_per_sec_max: self.rps.max(),
        };

        let profile = match self.flat_vus {
            Some(vus) => ProfileProgress::Flat {
                vus,
                duration: self.schedule.total_duration(),
            },
            None => ProfileProgress::Staged {
                total_duration: self.schedule.total_duration(),
                stage: self.schedule.stage_at(elapsed),
            },
        };

        ProgressUpdate {
            tick: self.tick,
            elapsed,
            state,
            target_vus: self.schedule.target_at(elapsed),
            active_vus: snapshot.vus_active,
            profile,
            live,
            snapshot,
        }
    }
}
