use hdrhistogram::Histogram;
use parking_lot::Mutex;

/// Upper bound of recordable values: 1 hour in microseconds. Larger values saturate.
const MAX_VALUE: u64 = 3_600_000_000;
const SIGNIFICANT_FIGURES: u8 = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramSummary {
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub count: u64,
}

impl HistogramSummary {
    /// Divides every statistic by `divisor` (e.g. `1000.0` to turn microseconds into
    /// milliseconds). `count` is unchanged.
    #[must_use]
    pub fn scaled(self, divisor: f64) -> Self {
        let s = |v: Option<f64>| v.map(|v| v / divisor);
        Self {
            p50: s(self.p50),
            p75: s(self.p75),
            p90: s(self.p90),
            p95: s(self.p95),
            p99: s(self.p99),
            min: s(self.min),
            max: s(self.max),
            mean: s(self.mean),
            stdev: s(self.stdev),
            count: self.count,
        }
    }
}

pub(crate) fn new_default_histogram() -> Histogram<u64> {
    match Histogram::<u64>::new_with_bounds(1, MAX_VALUE, SIGNIFICANT_FIGURES) {
        Ok(h) => h,
        Err(err) => panic!("failed to create histogram: {err}"),
    }
}

pub(crate) fn summarize_histogram(h: &Histogram<u64>) -> HistogramSummary {
    let count = h.len();
    let q = |quantile| (count > 0).then(|| h.value_at_quantile(quantile) as f64);

    HistogramSummary {
        p50: q(0.50),
        p75: q(0.75),
        p90: q(0.90),
        p95: q(0.95),
        p99: q(0.99),
        min: (count > 0).then(|| h.min() as f64),
        max: (count > 0).then(|| h.max() as f64),
        mean: (count > 0).then(|| h.mean()),
        stdev: (count > 0).then(|| h.stdev()),
        count,
    }
}

/// HDR histogram split into independently locked shards.
///
/// Writers pick a shard from a caller-provided key (e.g. the VU id), so concurrent writers
/// rarely contend on the same lock. Readers merge shard by shard and never hold more than
/// one shard lock at a time, so a read waits at most for a single in-flight `record`.
#[derive(Debug)]
pub struct ShardedHistogram {
    shards: Box<[Mutex<Histogram<u64>>]>,
}

impl Default for ShardedHistogram {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ShardedHistogram {
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(new_default_histogram()))
            .collect();
        Self { shards }
    }

    #[inline]
    pub fn record(&self, shard_key: u64, value: u64) {
        let idx = (shard_key % self.shards.len() as u64) as usize;
        self.shards[idx].lock().saturating_record(value.max(1));
    }

    pub fn count(&self) -> u64 {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn summary(&self) -> HistogramSummary {
        let mut merged = new_default_histogram();
        for shard in self.shards.iter() {
            let h = shard.lock();
            let _ = merged.add(&*h);
        }
        summarize_histogram(&merged)
    }
}
