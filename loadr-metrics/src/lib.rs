pub mod counter;
pub mod histogram;
pub mod stats;

pub use counter::{Counter, PeakGauge};
pub use histogram::{HistogramSummary, ShardedHistogram};
pub use stats::{CounterSnapshot, RunningStats, per_sec};
