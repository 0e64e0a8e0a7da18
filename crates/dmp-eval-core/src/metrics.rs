//! Global atomic counters for evaluator observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a CLI command).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations, no locking.
pub struct Metrics {
    evaluations_dispatched: AtomicU64,
    indeterminate_results: AtomicU64,
    check_timeouts: AtomicU64,
    check_panics: AtomicU64,
    reports_created: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            evaluations_dispatched: AtomicU64::new(0),
            indeterminate_results: AtomicU64::new(0),
            check_timeouts: AtomicU64::new(0),
            check_panics: AtomicU64::new(0),
            reports_created: AtomicU64::new(0),
        }
    }

    pub fn inc_evaluations_dispatched(&self) {
        self.evaluations_dispatched.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "evaluations_dispatched", "counter incremented");
    }

    pub fn inc_indeterminate(&self) {
        self.indeterminate_results.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "indeterminate_results", "counter incremented");
    }

    pub fn inc_check_timeouts(&self) {
        self.check_timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "check_timeouts", "counter incremented");
    }

    pub fn inc_check_panics(&self) {
        self.check_panics.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "check_panics", "counter incremented");
    }

    pub fn inc_reports_created(&self) {
        self.reports_created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reports_created", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            evaluations_dispatched = self.evaluations_dispatched(),
            indeterminate_results = self.indeterminate_results(),
            check_timeouts = self.check_timeouts(),
            check_panics = self.check_panics(),
            reports_created = self.reports_created(),
        );
    }

    pub fn evaluations_dispatched(&self) -> u64 {
        self.evaluations_dispatched.load(Ordering::Relaxed)
    }

    pub fn indeterminate_results(&self) -> u64 {
        self.indeterminate_results.load(Ordering::Relaxed)
    }

    pub fn check_timeouts(&self) -> u64 {
        self.check_timeouts.load(Ordering::Relaxed)
    }

    pub fn check_panics(&self) -> u64 {
        self.check_panics.load(Ordering::Relaxed)
    }

    pub fn reports_created(&self) -> u64 {
        self.reports_created.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.evaluations_dispatched.store(0, Ordering::Relaxed);
        self.indeterminate_results.store(0, Ordering::Relaxed);
        self.check_timeouts.store(0, Ordering::Relaxed);
        self.check_panics.store(0, Ordering::Relaxed);
        self.reports_created.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_evaluations_dispatched();
        m.inc_evaluations_dispatched();
        assert_eq!(m.evaluations_dispatched(), 2);

        m.inc_indeterminate();
        m.inc_check_timeouts();
        m.inc_check_panics();
        m.inc_check_panics();
        m.inc_reports_created();
        assert_eq!(m.indeterminate_results(), 1);
        assert_eq!(m.check_timeouts(), 1);
        assert_eq!(m.check_panics(), 2);
        assert_eq!(m.reports_created(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_evaluations_dispatched();
        m.inc_indeterminate();
        m.inc_check_timeouts();
        m.inc_check_panics();
        m.inc_reports_created();
        m.reset();
        assert_eq!(m.evaluations_dispatched(), 0);
        assert_eq!(m.indeterminate_results(), 0);
        assert_eq!(m.check_timeouts(), 0);
        assert_eq!(m.check_panics(), 0);
        assert_eq!(m.reports_created(), 0);
    }
}
