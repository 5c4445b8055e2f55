use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, lock-free delivery counters. The delivery pipeline increments
/// these on the hot path; the monitor reads them on its sampling interval
/// without contending with delivery. Mirrors `AppState.event_seq: AtomicU64`.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub processed: AtomicU64,
    pub delivered: AtomicU64,
    pub replied: AtomicU64,
    pub failed: AtomicU64,
}

impl PipelineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_replied(&self) {
        self.replied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            replied: self.replied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CounterSnapshot {
    pub processed: u64,
    pub delivered: u64,
    pub replied: u64,
    pub failed: u64,
}

impl CounterSnapshot {
    /// Fraction of processed units that ended in failure, in `[0.0, 1.0]`.
    pub fn error_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.failed as f64 / self.processed as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_rate_is_zero_with_no_traffic() {
        assert_eq!(CounterSnapshot::default().error_rate(), 0.0);
    }

    #[test]
    fn error_rate_divides_failed_by_processed() {
        let counters = PipelineCounters::new();
        for _ in 0..10 {
            counters.incr_processed();
        }
        for _ in 0..2 {
            counters.incr_failed();
        }
        assert!((counters.snapshot().error_rate() - 0.2).abs() < f64::EPSILON);
    }
}
