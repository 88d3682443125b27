use std::sync::Arc;
use std::time::Duration;

use scenevault_model::{JobId, JobRecord, ProcessingPhase, SceneId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::RetentionConfig;
use crate::error::CoreResult;
use crate::store::JobLedgerStore;

/// Thin façade over [`JobLedgerStore`] that also owns the periodic retention
/// sweeper. Kept separate from the raw store trait so the
/// scheduler depends on one handle instead of threading `RetentionConfig`
/// and a `Clock` through every call site.
pub struct JobLedger {
    store: Arc<dyn JobLedgerStore>,
    clock: Arc<dyn Clock>,
}

impl JobLedger {
    pub fn new(store: Arc<dyn JobLedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn begin(&self, scene_id: SceneId, phase: ProcessingPhase) -> CoreResult<JobRecord> {
        self.store.begin(scene_id, phase).await
    }

    pub async fn complete(&self, job_id: JobId) -> CoreResult<()> {
        self.store.complete(job_id).await
    }

    pub async fn fail(&self, job_id: JobId, error_message: &str) -> CoreResult<()> {
        self.store.fail(job_id, error_message).await
    }

    pub async fn cancel(&self, job_id: JobId, reason: &str) -> CoreResult<()> {
        self.store.cancel(job_id, reason).await
    }

    pub async fn list(&self, offset: u64, limit: u64) -> CoreResult<Vec<JobRecord>> {
        self.store.list(offset, limit).await
    }

    pub async fn active(&self) -> CoreResult<Vec<JobRecord>> {
        self.store.active().await
    }

    /// Restart reconciliation step: every `running` row is terminal-cancelled
    /// with reason "restart" before new enqueues start.
    pub async fn cancel_all_running_for_restart(&self) -> CoreResult<Vec<JobRecord>> {
        self.store.cancel_all_running("restart").await
    }

    /// Spawns the background sweeper: deletes terminal rows older than
    /// `job_retention_days` on an interval timer, stopping when `shutdown`
    /// is cancelled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        retention: RetentionConfig,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let ledger = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(retention.sweep_interval_secs));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("job ledger sweeper shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let older_than = ledger.clock.now() - chrono::Duration::days(retention.job_retention_days);
                        match ledger.store.sweep(older_than).await {
                            Ok(0) => {}
                            Ok(n) => info!(rows_deleted = n, "job ledger sweep completed"),
                            Err(error) => warn!(%error, "job ledger sweep failed"),
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::store::InMemoryStore;
    use scenevault_model::ProcessingPhase;

    #[tokio::test]
    async fn sweep_only_removes_rows_older_than_the_window() {
        let store: Arc<dyn JobLedgerStore> = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(chrono::Utc::now()));
        let ledger = JobLedger::new(Arc::clone(&store), clock.clone() as Arc<dyn Clock>);

        let scene_id = SceneId(1);
        let job = ledger.begin(scene_id, ProcessingPhase::Metadata).await.unwrap();
        ledger.complete(job.job_id).await.unwrap();

        // Fresh terminal row must survive a sweep with a window in the past.
        let swept = store.sweep(chrono::Utc::now() - chrono::Duration::days(1)).await.unwrap();
        assert_eq!(swept, 0);

        let swept = store.sweep(chrono::Utc::now() + chrono::Duration::days(1)).await.unwrap();
        assert_eq!(swept, 1);
    }
}
