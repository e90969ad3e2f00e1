use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Monotonic counter. Only ever incremented, so successive loads never go backwards.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    #[inline]
    pub fn increment(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc(&self) {
        self.increment(1);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Gauge that remembers the highest value it has held.
#[derive(Debug, Default)]
pub struct PeakGauge {
    current: AtomicI64,
    peak: AtomicI64,
}

impl PeakGauge {
    pub fn increment(&self) {
        let new = self.current.fetch_add(1, Ordering::Relaxed).saturating_add(1);

        // CAS loop to keep the max without races.
        let mut cur = self.peak.load(Ordering::Relaxed);
        while new > cur {
            match self
                .peak
                .compare_exchange_weak(cur, new, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
    }

    pub fn decrement(&self) {
        self.current.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed).max(0) as u64
    }

    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::Relaxed).max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let c = Counter::default();
        c.inc();
        c.increment(4);
        assert_eq!(c.get(), 5);
    }

    #[test]
    fn peak_gauge_keeps_high_water_mark() {
        let g = PeakGauge::default();
        g.increment();
        g.increment();
        g.increment();
        g.decrement();
        g.decrement();
        assert_eq!(g.current(), 1);
        assert_eq!(g.peak(), 3);

        g.increment();
        assert_eq!(g.peak(), 3);
    }

    #[test]
    fn peak_gauge_is_consistent_across_threads() {
        let g = std::sync::Arc::new(PeakGauge::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let g = g.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        g.increment();
                        g.decrement();
                    }
                })
            })
            .collect();
        for h in handles {
            let _ = h.join();
        }

        assert_eq!(g.current(), 0);
        assert!(g.peak() >= 1 && g.peak() <= 8);
    }
}
