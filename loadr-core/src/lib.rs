//! Load-generation engine: a pool of virtual users driven by a traffic profile.
//!
//! The [`Executor`] owns the run. Each tick it asks the [`RampSchedule`] how many
//! virtual users should be alive, grows or shrinks the pool, and when the profile
//! ends drains the pool within a grace period. Every finished iteration is checked
//! and recorded into a shared [`MetricsAggregator`].

#![forbid(unsafe_code)]

pub mod checks;
pub mod config;
pub mod error;
pub mod executor;
#[cfg(feature = "http")]
pub mod http_scenario;
pub mod metrics;
pub mod outcome;
mod pool;
pub mod progress;
pub mod ramp;
pub mod scenario;
mod signal;
pub mod vu;

pub use checks::{Check, CheckResult, CheckRule, CheckSet, Predicate, evaluate};
pub use config::{
    DEFAULT_GRACE_PERIOD, DEFAULT_TICK, MAX_TOTAL_DURATION, ProfileOptions, RunConfig, Stage,
    TestPlan, TrafficProfile, profile_from_options,
};
pub use error::{ConfigError, Error, Result};
pub use executor::{Executor, ExecutorHandle, ExecutorState, run};
#[cfg(feature = "http")]
pub use http_scenario::{HttpScenario, RequestStep};
pub use metrics::{Anomaly, AnomalyKind, CheckCounts, MetricsAggregator, MetricsSnapshot};
pub use outcome::{ErrorKind, IterationOutcome, RequestResult};
pub use progress::{LiveMetrics, ProfileProgress, ProgressFn, ProgressUpdate};
pub use ramp::{RampSchedule, StageSnapshot};
pub use scenario::{FnScenario, IterationContext, Scenario, ThinkTime};
pub use vu::VuState;

pub use loadr_metrics::HistogramSummary;
#[cfg(feature = "http")]
pub use loadr_http as http;
