//! Per-report serialization of the finalize step.
//!
//! Appending to a report is the only shared mutation in the core. Holding the
//! guard for a report id orders concurrent finalizations targeting it.

use std::sync::Arc;

use dashmap::DashMap;
use dmp_eval_state::ReportId;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct ReportLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ReportLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `report_id`.
    pub async fn lock(&self, report_id: &ReportId) -> OwnedMutexGuard<()> {
        let mutex = Arc::clone(
            self.inner
                .entry(report_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        mutex.lock_owned().await
    }

    /// Forget the lock of `report_id` once nobody holds or waits for it.
    ///
    /// Call after dropping the guard. A task that is still waiting keeps its
    /// own handle, so the entry stays until the last user releases it.
    pub fn release(&self, report_id: &ReportId) {
        self.inner
            .remove_if(report_id.as_str(), |_, mutex| Arc::strong_count(mutex) == 1);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_report_is_exclusive() {
        let locks = ReportLocks::new();
        let report = ReportId::from("r1");

        let guard = locks.lock(&report).await;
        let blocked = tokio::time::timeout(Duration::from_millis(20), locks.lock(&report)).await;
        assert!(blocked.is_err());

        drop(guard);
        let reacquired = tokio::time::timeout(Duration::from_millis(200), locks.lock(&report)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn different_reports_do_not_block() {
        let locks = ReportLocks::new();
        let _a = locks.lock(&ReportId::from("a")).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock(&ReportId::from("b"))).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn release_skips_locks_still_in_use() {
        let locks = ReportLocks::new();
        let report = ReportId::from("r1");

        let guard = locks.lock(&report).await;
        let waiter = {
            let locks = locks.clone();
            let report = report.clone();
            tokio::spawn(async move {
                let _g = locks.lock(&report).await;
            })
        };
        tokio::task::yield_now().await;

        locks.release(&report);
        assert_eq!(locks.len(), 1);

        drop(guard);
        waiter.await.unwrap();
        locks.release(&report);
        assert!(locks.is_empty());
    }
}
