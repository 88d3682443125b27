use async_trait::async_trait;
use scenevault_model::SceneId;

use crate::error::CoreResult;

/// Seam between the Scanner and the Phase Scheduler: the scanner only needs
/// to hand off a newly-created or re-linked scene id, never the scheduler's
/// internals. Implemented by `crate::scheduler::PhaseScheduler`. Kept as its
/// own trait (rather than the scanner depending on the scheduler module
/// directly) so either side can be driven by a fake in isolation.
#[async_trait]
pub trait SceneEnqueuer: Send + Sync {
    async fn enqueue(&self, scene_id: SceneId) -> CoreResult<()>;
}
