/// Streaming mean, sample standard deviation and maximum (Welford).
///
/// Fed one requests-per-second sample per progress tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    sum_sq_dev: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, sample: f64) {
        self.count = self.count.saturating_add(1);
        let before = self.mean;
        self.mean = before + (sample - before) / self.count as f64;
        self.sum_sq_dev += (sample - before) * (sample - self.mean);
        self.max = if self.count == 1 {
            sample
        } else {
            self.max.max(sample)
        };
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Zero until there are two samples.
    pub fn stdev(&self) -> f64 {
        match self.count {
            0 | 1 => 0.0,
            n => (self.sum_sq_dev / (n - 1) as f64).sqrt(),
        }
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

/// A monotonic counter read at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub total: u64,
}

impl CounterSnapshot {
    pub fn new(total: u64) -> Self {
        Self { total }
    }

    /// Growth since `prev`, or the whole total for the first reading.
    pub fn delta_since(self, prev: Option<Self>) -> u64 {
        let base = prev.map_or(0, |p| p.total);
        self.total.saturating_sub(base)
    }

    pub fn per_sec_since(self, prev: Option<Self>, dt_secs: f64) -> f64 {
        per_sec(self.delta_since(prev), dt_secs)
    }
}

/// `delta / dt`, with `dt` clamped away from zero.
#[inline]
pub fn per_sec(delta: u64, dt_secs: f64) -> f64 {
    delta as f64 / dt_secs.max(1e-9)
}
