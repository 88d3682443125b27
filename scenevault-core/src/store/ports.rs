use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scenevault_model::{
    FingerprintKind, FingerprintRow, JobId, JobRecord, ProcessingPhase, ScanCounters, ScanId,
    ScanRecord, Scene, SceneId, StorageRoot,
};

use crate::error::CoreResult;

/// Scene returned by a successful claim, carrying what the worker needs to
/// run the transcoder operation without a second round trip.
#[derive(Clone, Debug)]
pub struct ClaimedScene {
    pub scene: Scene,
}

/// Output fields a phase writes back to the Scene Store on success. Only the
/// fields relevant to the completing phase are set; the rest stay `None` and
/// are left untouched by the store implementation.
#[derive(Clone, Debug, Default)]
pub struct SceneMutation {
    pub duration_secs: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub frame_rate: Option<f64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<Option<String>>,
    pub thumbnail_path: Option<String>,
    pub sprite_sheet_path: Option<String>,
    pub sprite_cue_path: Option<String>,
    pub preview_path: Option<String>,
}

/// Repository of scenes and derived artifacts. The Phase Scheduler mutates
/// scenes only through this trait — it never
/// inspects or writes fields outside the claim protocol.
#[async_trait]
pub trait SceneStore: Send + Sync {
    async fn get(&self, scene_id: SceneId) -> CoreResult<Option<Scene>>;

    async fn list_by_status(
        &self,
        status: scenevault_model::ProcessingStatus,
    ) -> CoreResult<Vec<Scene>>;

    async fn find_by_content_hash(&self, content_hash: &str) -> CoreResult<Option<Scene>>;

    /// Creates a new scene with `status=pending`, `phase=metadata`.
    async fn create_scene(
        &self,
        path: &str,
        size_bytes: u64,
        content_hash: &str,
        original_filename: &str,
    ) -> CoreResult<Scene>;

    /// Re-links a scene whose content moved on disk since it was registered.
    async fn update_path(&self, scene_id: SceneId, new_path: &str) -> CoreResult<()>;

    /// Atomically claims the next pending scene at `phase`, transitioning it
    /// to `status=processing`. Returns `None` if nothing is pending. This is
    /// the sole lock-like primitive — callers never race each other for the
    /// same scene.
    async fn claim_next_pending(&self, phase: ProcessingPhase) -> CoreResult<Option<ClaimedScene>>;

    /// Claims a *specific* scene at `phase` — used when the scheduler
    /// already knows which scene id it wants to run (e.g. handing a scene
    /// off from phase k to k+1, or re-enqueueing after restart).
    async fn claim_scene(&self, scene_id: SceneId, phase: ProcessingPhase)
    -> CoreResult<Option<ClaimedScene>>;

    /// Writes phase outputs and advances to the next phase, or to
    /// `status=ready`/`phase=None` if `phase` was the last one.
    async fn complete_phase(
        &self,
        scene_id: SceneId,
        phase: ProcessingPhase,
        mutation: SceneMutation,
    ) -> CoreResult<Scene>;

    /// Marks the scene `status=failed` with the given message, keeping
    /// `phase` pinned at the phase that failed.
    async fn fail_phase(
        &self,
        scene_id: SceneId,
        phase: ProcessingPhase,
        error_message: &str,
    ) -> CoreResult<()>;

    /// Reverts the scene to `status=pending` at the same phase (cancellation
    /// or restart reconciliation).
    async fn revert_to_pending(&self, scene_id: SceneId) -> CoreResult<()>;

    /// Returns every scene currently `status=processing`, used by restart
    /// reconciliation.
    async fn list_processing(&self) -> CoreResult<Vec<Scene>>;

    async fn trash(&self, scene_id: SceneId, retention_days: i64, now: DateTime<Utc>) -> CoreResult<()>;

    /// Permanently purges scenes whose retention window has elapsed.
    async fn purge_expired_trash(&self, now: DateTime<Utc>) -> CoreResult<Vec<SceneId>>;
}

/// Append-only log of job attempts.
#[async_trait]
pub trait JobLedgerStore: Send + Sync {
    async fn begin(&self, scene_id: SceneId, phase: ProcessingPhase) -> CoreResult<JobRecord>;
    async fn complete(&self, job_id: JobId) -> CoreResult<()>;
    async fn fail(&self, job_id: JobId, error_message: &str) -> CoreResult<()>;
    async fn cancel(&self, job_id: JobId, reason: &str) -> CoreResult<()>;

    async fn list(&self, offset: u64, limit: u64) -> CoreResult<Vec<JobRecord>>;

    /// All rows currently `status=running`.
    async fn active(&self) -> CoreResult<Vec<JobRecord>>;

    /// Transitions every `running` row to `cancelled` with `reason`; used by
    /// restart reconciliation. Returns the affected rows.
    async fn cancel_all_running(&self, reason: &str) -> CoreResult<Vec<JobRecord>>;

    /// Deletes terminal rows older than `older_than`. Rows in `running` are
    /// never swept.
    async fn sweep(&self, older_than: DateTime<Utc>) -> CoreResult<u64>;
}

/// Repository for fingerprint rows. Writes for a scene+kind are always
/// all-or-nothing.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    async fn replace_for_scene(
        &self,
        scene_id: SceneId,
        kind: FingerprintKind,
        rows: Vec<FingerprintRow>,
    ) -> CoreResult<()>;

    async fn for_scene(&self, scene_id: SceneId, kind: FingerprintKind) -> CoreResult<Vec<FingerprintRow>>;

    /// Every row in the corpus, used to build the duplicate-detector index.
    async fn all(&self, kind: FingerprintKind) -> CoreResult<Vec<FingerprintRow>>;

    async fn delete_for_scene(&self, scene_id: SceneId) -> CoreResult<()>;
}

/// Scan executions.
#[async_trait]
pub trait ScanRecordStore: Send + Sync {
    async fn create_running(&self, scan_id: ScanId, started_at: DateTime<Utc>) -> CoreResult<ScanRecord>;
    async fn get(&self, scan_id: ScanId) -> CoreResult<Option<ScanRecord>>;
    async fn get_running(&self) -> CoreResult<Option<ScanRecord>>;
    async fn update_progress(
        &self,
        scan_id: ScanId,
        counters: ScanCounters,
        current_root: Option<String>,
        current_path: Option<String>,
    ) -> CoreResult<()>;
    async fn complete(&self, scan_id: ScanId, completed_at: DateTime<Utc>) -> CoreResult<()>;
    async fn cancel(&self, scan_id: ScanId, completed_at: DateTime<Utc>) -> CoreResult<()>;
    async fn fail(&self, scan_id: ScanId, completed_at: DateTime<Utc>) -> CoreResult<()>;
    /// Marks any scan still `running` as `cancelled` — restart reconciliation.
    async fn cancel_all_running(&self, completed_at: DateTime<Utc>) -> CoreResult<()>;
}

#[async_trait]
pub trait StorageRootStore: Send + Sync {
    async fn list(&self) -> CoreResult<Vec<StorageRoot>>;
}
