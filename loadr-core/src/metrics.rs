use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use ahash::RandomState;
use dashmap::DashMap;
use loadr_metrics::{Counter, HistogramSummary, PeakGauge, ShardedHistogram, per_sec};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::checks::CheckResult;
use crate::outcome::{ErrorKind, IterationOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AnomalyKind {
    /// A stopping virtual user had to be aborted after the grace period.
    GracePeriodExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub vu_id: u64,
    pub kind: AnomalyKind,
    /// Time since the run started.
    pub at: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckCounts {
    pub passed: u64,
    pub failed: u64,
}

impl CheckCounts {
    pub fn total(&self) -> u64 {
        self.passed + self.failed
    }
}

/// Point-in-time copy of the aggregated metrics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub elapsed: Duration,

    pub requests_total: u64,
    pub requests_failed: u64,

    pub iterations_total: u64,
    pub iterations_failed: u64,
    /// Iterations cut short by a forced stop. Not included in `iterations_total`.
    pub iterations_interrupted: u64,

    pub checks_passed: u64,
    pub checks_failed: u64,
    pub checks: BTreeMap<String, CheckCounts>,

    pub errors: BTreeMap<ErrorKind, u64>,
    pub status_codes: BTreeMap<u16, u64>,

    /// Request latency in milliseconds.
    pub latency_ms: HistogramSummary,
    /// Whole-iteration duration in milliseconds.
    pub iteration_duration_ms: HistogramSummary,

    pub vus_active: u64,
    pub vus_peak: u64,

    pub anomalies: Vec<Anomaly>,
}

impl MetricsSnapshot {
    pub fn requests_per_sec(&self) -> f64 {
        per_sec(self.requests_total, self.elapsed.as_secs_f64())
    }

    pub fn iterations_per_sec(&self) -> f64 {
        per_sec(self.iterations_total, self.elapsed.as_secs_f64())
    }

    pub fn request_error_rate(&self) -> f64 {
        if self.requests_total == 0 {
            return 0.0;
        }
        self.requests_failed as f64 / self.requests_total as f64
    }

    pub fn checks_total(&self) -> u64 {
        self.checks_passed + self.checks_failed
    }

    pub fn has_failed_checks(&self) -> bool {
        self.checks_failed > 0
    }
}

#[derive(Debug, Default)]
struct CheckTally {
    passed: Counter,
    failed: Counter,
}

/// Lock-light sink for everything virtual users report.
///
/// Counters are atomics and only ever grow. Latencies go to a histogram sharded by
/// virtual user id, so concurrent writers rarely contend and a snapshot holds at most
/// one shard lock at a time.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    started: OnceLock<Instant>,
    finished: OnceLock<Duration>,

    requests_total: Counter,
    requests_failed: Counter,
    iterations_total: Counter,
    iterations_failed: Counter,
    iterations_interrupted: Counter,
    checks_passed: Counter,
    checks_failed: Counter,

    checks: DashMap<Arc<str>, CheckTally, RandomState>,
    errors: DashMap<ErrorKind, Counter, RandomState>,
    status_codes: DashMap<u16, Counter, RandomState>,

    // Microseconds.
    latency: ShardedHistogram,
    iteration_duration: ShardedHistogram,

    vus: PeakGauge,
    anomalies: Mutex<Vec<Anomaly>>,
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the clock. Later calls are ignored.
    pub fn mark_started(&self, at: Instant) {
        let _ = self.started.set(at);
    }

    /// Freezes `elapsed` for every later snapshot.
    pub fn mark_finished(&self) {
        let _ = self.finished.set(self.elapsed());
    }

    pub fn elapsed(&self) -> Duration {
        if let Some(finished) = self.finished.get() {
            return *finished;
        }
        self.started
            .get()
            .map(|s| s.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Records one finished iteration and its check results.
    pub fn record(&self, vu_id: u64, outcome: &IterationOutcome, checks: &[CheckResult]) {
        for req in &outcome.requests {
            self.requests_total.inc();
            if req.is_failed() {
                self.requests_failed.inc();
            }
            if let Some(kind) = req.error {
                self.errors.entry(kind).or_default().inc();
            }
            if let Some(status) = req.status {
                self.status_codes.entry(status).or_default().inc();
            }
            self.latency.record(vu_id, micros(req.latency));
        }

        self.iterations_total.inc();
        if let Some(kind) = outcome.error {
            self.iterations_failed.inc();
            // Request errors were already counted per request.
            if outcome.requests.iter().all(|r| r.error.is_none()) {
                self.errors.entry(kind).or_default().inc();
            }
        }
        self.iteration_duration.record(vu_id, micros(outcome.elapsed));

        for check in checks {
            self.record_check(check);
        }
    }

    fn record_check(&self, check: &CheckResult) {
        let bump = |tally: &CheckTally| {
            if check.passed {
                tally.passed.inc();
            } else {
                tally.failed.inc();
            }
        };

        if check.passed {
            self.checks_passed.inc();
        } else {
            self.checks_failed.inc();
        }

        if let Some(tally) = self.checks.get(&*check.name) {
            bump(&tally);
            return;
        }
        bump(&self.checks.entry(Arc::clone(&check.name)).or_default());
    }

    pub fn record_interrupted(&self) {
        self.iterations_interrupted.inc();
    }

    pub fn record_anomaly(&self, vu_id: u64, kind: AnomalyKind) {
        let anomaly = Anomaly {
            vu_id,
            kind,
            at: self.elapsed(),
        };
        self.anomalies.lock().push(anomaly);
    }

    pub(crate) fn vu_started(&self) {
        self.vus.increment();
    }

    pub(crate) fn vu_stopped(&self) {
        self.vus.decrement();
    }

    pub fn vus_active(&self) -> u64 {
        self.vus.current()
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.get()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let checks = self
            .checks
            .iter()
            .map(|e| {
                let counts = CheckCounts {
                    passed: e.value().passed.get(),
                    failed: e.value().failed.get(),
                };
                (e.key().to_string(), counts)
            })
            .collect();

        let errors = self
            .errors
            .iter()
            .map(|e| (*e.key(), e.value().get()))
            .collect();

        let status_codes = self
            .status_codes
            .iter()
            .map(|e| (*e.key(), e.value().get()))
            .collect();

        MetricsSnapshot {
            elapsed: self.elapsed(),
            requests_total: self.requests_total.get(),
            requests_failed: self.requests_failed.get(),
            iterations_total: self.iterations_total.get(),
            iterations_failed: self.iterations_failed.get(),
            iterations_interrupted: self.iterations_interrupted.get(),
            checks_passed: self.checks_passed.get(),
            checks_failed: self.checks_failed.get(),
            checks,
            errors,
            status_codes,
            latency_ms: self.latency.summary().scaled(1000.0),
            iteration_duration_ms: self.iteration_duration.summary().scaled(1000.0),
            vus_active: self.vus.current(),
            vus_peak: self.vus.peak(),
            anomalies: self.anomalies.lock().clone(),
        }
    }
}
