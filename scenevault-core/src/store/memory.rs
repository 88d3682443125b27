use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scenevault_model::{
    DerivedArtifacts, FingerprintKind, FingerprintRow, JobId, JobRecord, JobStatus, MediaProbe,
    ProcessingPhase, ProcessingStatus, ScanCounters, ScanId, ScanRecord, ScanStatus, Scene, SceneId,
    SceneUuid, StorageRoot,
};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

use super::ports::{ClaimedScene, FingerprintStore, JobLedgerStore, ScanRecordStore, SceneMutation, SceneStore, StorageRootStore};

struct Inner {
    scenes: HashMap<SceneId, Scene>,
    jobs: HashMap<JobId, JobRecord>,
    fingerprints: HashMap<(SceneId, FingerprintKind), Vec<FingerprintRow>>,
    scans: HashMap<ScanId, ScanRecord>,
    roots: Vec<StorageRoot>,
}

/// In-memory implementation of every repository port, used by unit and
/// scheduler/scanner/detector tests in place of a live Postgres instance.
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    next_id: AtomicI64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                scenes: HashMap::new(),
                jobs: HashMap::new(),
                fingerprints: HashMap::new(),
                scans: HashMap::new(),
                roots: Vec::new(),
            }),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn with_roots(roots: Vec<StorageRoot>) -> Self {
        let store = Self::new();
        store.inner.lock().expect("lock").roots = roots;
        store
    }

    fn next_scene_id(&self) -> SceneId {
        SceneId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl SceneStore for InMemoryStore {
    async fn get(&self, scene_id: SceneId) -> CoreResult<Option<Scene>> {
        Ok(self.inner.lock().expect("lock").scenes.get(&scene_id).cloned())
    }

    async fn list_by_status(&self, status: ProcessingStatus) -> CoreResult<Vec<Scene>> {
        Ok(self
            .inner
            .lock()
            .expect("lock")
            .scenes
            .values()
            .filter(|s| s.processing_status == status)
            .cloned()
            .collect())
    }

    async fn find_by_content_hash(&self, content_hash: &str) -> CoreResult<Option<Scene>> {
        Ok(self
            .inner
            .lock()
            .expect("lock")
            .scenes
            .values()
            .find(|s| s.content_hash == content_hash)
            .cloned())
    }

    async fn create_scene(
        &self,
        path: &str,
        size_bytes: u64,
        content_hash: &str,
        original_filename: &str,
    ) -> CoreResult<Scene> {
        let id = self.next_scene_id();
        let now = Utc::now();
        let scene = Scene {
            id,
            uuid: SceneUuid(Uuid::now_v7()),
            path: path.to_string(),
            size_bytes,
            content_hash: content_hash.to_string(),
            original_filename: original_filename.to_string(),
            title: original_filename.to_string(),
            probe: MediaProbe::default(),
            artifacts: DerivedArtifacts::default(),
            processing_status: ProcessingStatus::Pending,
            processing_phase: Some(ProcessingPhase::Metadata),
            processing_error: None,
            trashed_at: None,
            trash_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().expect("lock").scenes.insert(id, scene.clone());
        Ok(scene)
    }

    async fn update_path(&self, scene_id: SceneId, new_path: &str) -> CoreResult<()> {
        let mut inner = self.inner.lock().expect("lock");
        let scene = inner
            .scenes
            .get_mut(&scene_id)
            .ok_or_else(|| CoreError::NotFound(format!("scene {scene_id}")))?;
        scene.path = new_path.to_string();
        scene.updated_at = Utc::now();
        Ok(())
    }

    async fn claim_next_pending(&self, phase: ProcessingPhase) -> CoreResult<Option<ClaimedScene>> {
        let mut inner = self.inner.lock().expect("lock");
        let candidate = inner
            .scenes
            .values()
            .find(|s| {
                s.processing_status == ProcessingStatus::Pending && s.processing_phase == Some(phase)
            })
            .map(|s| s.id);

        let Some(scene_id) = candidate else {
            return Ok(None);
        };

        let scene = inner.scenes.get_mut(&scene_id).expect("just found");
        scene.processing_status = ProcessingStatus::Processing;
        scene.processing_phase = Some(phase);
        scene.updated_at = Utc::now();
        Ok(Some(ClaimedScene { scene: scene.clone() }))
    }

    async fn claim_scene(
        &self,
        scene_id: SceneId,
        phase: ProcessingPhase,
    ) -> CoreResult<Option<ClaimedScene>> {
        let mut inner = self.inner.lock().expect("lock");
        let Some(scene) = inner.scenes.get_mut(&scene_id) else {
            return Ok(None);
        };
        let eligible = matches!(
            scene.processing_status,
            ProcessingStatus::Pending | ProcessingStatus::Processing
        ) && scene.processing_phase == Some(phase);
        if !eligible {
            return Ok(None);
        }
        scene.processing_status = ProcessingStatus::Processing;
        scene.updated_at = Utc::now();
        Ok(Some(ClaimedScene { scene: scene.clone() }))
    }

    async fn complete_phase(
        &self,
        scene_id: SceneId,
        phase: ProcessingPhase,
        mutation: SceneMutation,
    ) -> CoreResult<Scene> {
        let mut inner = self.inner.lock().expect("lock");
        let scene = inner
            .scenes
            .get_mut(&scene_id)
            .ok_or_else(|| CoreError::NotFound(format!("scene {scene_id}")))?;

        if scene.processing_phase != Some(phase) {
            return Err(CoreError::Conflict(format!(
                "scene {scene_id} is not at phase {phase:?}"
            )));
        }

        if let Some(v) = mutation.duration_secs {
            scene.probe.duration_secs = Some(v);
        }
        if let Some(v) = mutation.width {
            scene.probe.width = Some(v);
        }
        if let Some(v) = mutation.height {
            scene.probe.height = Some(v);
        }
        if let Some(v) = mutation.frame_rate {
            scene.probe.frame_rate = Some(v);
        }
        if let Some(v) = mutation.video_codec {
            scene.probe.video_codec = Some(v);
        }
        if let Some(v) = mutation.audio_codec {
            scene.probe.audio_codec = v;
        }
        if let Some(v) = mutation.thumbnail_path {
            scene.artifacts.thumbnail_path = Some(v);
        }
        if let Some(v) = mutation.sprite_sheet_path {
            scene.artifacts.sprite_sheet_path = Some(v);
        }
        if let Some(v) = mutation.sprite_cue_path {
            scene.artifacts.sprite_cue_path = Some(v);
        }
        if let Some(v) = mutation.preview_path {
            scene.artifacts.preview_path = Some(v);
        }

        match phase.next() {
            Some(next_phase) => {
                scene.processing_phase = Some(next_phase);
                scene.processing_status = ProcessingStatus::Pending;
            }
            None => {
                scene.processing_phase = None;
                scene.processing_status = ProcessingStatus::Ready;
            }
        }
        scene.processing_error = None;
        scene.updated_at = Utc::now();
        Ok(scene.clone())
    }

    async fn fail_phase(&self, scene_id: SceneId, phase: ProcessingPhase, error_message: &str) -> CoreResult<()> {
        let mut inner = self.inner.lock().expect("lock");
        let scene = inner
            .scenes
            .get_mut(&scene_id)
            .ok_or_else(|| CoreError::NotFound(format!("scene {scene_id}")))?;
        scene.processing_status = ProcessingStatus::Failed;
        scene.processing_phase = Some(phase);
        scene.processing_error = Some(error_message.to_string());
        scene.updated_at = Utc::now();
        Ok(())
    }

    async fn revert_to_pending(&self, scene_id: SceneId) -> CoreResult<()> {
        let mut inner = self.inner.lock().expect("lock");
        let scene = inner
            .scenes
            .get_mut(&scene_id)
            .ok_or_else(|| CoreError::NotFound(format!("scene {scene_id}")))?;
        scene.processing_status = ProcessingStatus::Pending;
        scene.updated_at = Utc::now();
        Ok(())
    }

    async fn list_processing(&self) -> CoreResult<Vec<Scene>> {
        self.list_by_status(ProcessingStatus::Processing).await
    }

    async fn trash(&self, scene_id: SceneId, retention_days: i64, now: DateTime<Utc>) -> CoreResult<()> {
        let mut inner = self.inner.lock().expect("lock");
        let scene = inner
            .scenes
            .get_mut(&scene_id)
            .ok_or_else(|| CoreError::NotFound(format!("scene {scene_id}")))?;
        scene.processing_status = ProcessingStatus::Trashed;
        scene.trashed_at = Some(now);
        scene.trash_expires_at = Some(now + chrono::Duration::days(retention_days));
        scene.updated_at = now;
        Ok(())
    }

    async fn purge_expired_trash(&self, now: DateTime<Utc>) -> CoreResult<Vec<SceneId>> {
        let mut inner = self.inner.lock().expect("lock");
        let expired: Vec<SceneId> = inner
            .scenes
            .values()
            .filter(|s| matches!(s.trash_expires_at, Some(exp) if exp <= now))
            .map(|s| s.id)
            .collect();
        for id in &expired {
            inner.scenes.remove(id);
            inner.fingerprints.retain(|(sid, _), _| sid != id);
        }
        Ok(expired)
    }
}

#[async_trait]
impl JobLedgerStore for InMemoryStore {
    async fn begin(&self, scene_id: SceneId, phase: ProcessingPhase) -> CoreResult<JobRecord> {
        let record = JobRecord::new_running(scene_id, phase, Utc::now());
        self.inner.lock().expect("lock").jobs.insert(record.job_id, record.clone());
        Ok(record)
    }

    async fn complete(&self, job_id: JobId) -> CoreResult<()> {
        let mut inner = self.inner.lock().expect("lock");
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| CoreError::NotFound(format!("job {job_id}")))?;
        job.status = JobStatus::Completed;
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail(&self, job_id: JobId, error_message: &str) -> CoreResult<()> {
        let mut inner = self.inner.lock().expect("lock");
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| CoreError::NotFound(format!("job {job_id}")))?;
        job.status = JobStatus::Failed;
        job.completed_at = Some(Utc::now());
        job.error_message = Some(error_message.to_string());
        Ok(())
    }

    async fn cancel(&self, job_id: JobId, reason: &str) -> CoreResult<()> {
        let mut inner = self.inner.lock().expect("lock");
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| CoreError::NotFound(format!("job {job_id}")))?;
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(Utc::now());
        job.error_message = Some(reason.to_string());
        Ok(())
    }

    async fn list(&self, offset: u64, limit: u64) -> CoreResult<Vec<JobRecord>> {
        let inner = self.inner.lock().expect("lock");
        let mut jobs: Vec<JobRecord> = inner.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs.reverse();
        Ok(jobs
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn active(&self) -> CoreResult<Vec<JobRecord>> {
        Ok(self
            .inner
            .lock()
            .expect("lock")
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Running)
            .cloned()
            .collect())
    }

    async fn cancel_all_running(&self, reason: &str) -> CoreResult<Vec<JobRecord>> {
        let mut inner = self.inner.lock().expect("lock");
        let now = Utc::now();
        let mut cancelled = Vec::new();
        for job in inner.jobs.values_mut() {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(now);
                job.error_message = Some(reason.to_string());
                cancelled.push(job.clone());
            }
        }
        Ok(cancelled)
    }

    async fn sweep(&self, older_than: DateTime<Utc>) -> CoreResult<u64> {
        let mut inner = self.inner.lock().expect("lock");
        let before = inner.jobs.len();
        inner.jobs.retain(|_, job| {
            job.status == JobStatus::Running
                || job.completed_at.map(|t| t > older_than).unwrap_or(true)
        });
        Ok((before - inner.jobs.len()) as u64)
    }
}

#[async_trait]
impl FingerprintStore for InMemoryStore {
    async fn replace_for_scene(
        &self,
        scene_id: SceneId,
        kind: FingerprintKind,
        rows: Vec<FingerprintRow>,
    ) -> CoreResult<()> {
        self.inner
            .lock()
            .expect("lock")
            .fingerprints
            .insert((scene_id, kind), rows);
        Ok(())
    }

    async fn for_scene(&self, scene_id: SceneId, kind: FingerprintKind) -> CoreResult<Vec<FingerprintRow>> {
        Ok(self
            .inner
            .lock()
            .expect("lock")
            .fingerprints
            .get(&(scene_id, kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn all(&self, kind: FingerprintKind) -> CoreResult<Vec<FingerprintRow>> {
        Ok(self
            .inner
            .lock()
            .expect("lock")
            .fingerprints
            .iter()
            .filter(|((_, k), _)| *k == kind)
            .flat_map(|(_, rows)| rows.clone())
            .collect())
    }

    async fn delete_for_scene(&self, scene_id: SceneId) -> CoreResult<()> {
        self.inner
            .lock()
            .expect("lock")
            .fingerprints
            .retain(|(sid, _), _| *sid != scene_id);
        Ok(())
    }
}

#[async_trait]
impl ScanRecordStore for InMemoryStore {
    async fn create_running(&self, scan_id: ScanId, started_at: DateTime<Utc>) -> CoreResult<ScanRecord> {
        let record = ScanRecord::new_running(scan_id, started_at);
        self.inner.lock().expect("lock").scans.insert(scan_id, record.clone());
        Ok(record)
    }

    async fn get(&self, scan_id: ScanId) -> CoreResult<Option<ScanRecord>> {
        Ok(self.inner.lock().expect("lock").scans.get(&scan_id).cloned())
    }

    async fn get_running(&self) -> CoreResult<Option<ScanRecord>> {
        Ok(self
            .inner
            .lock()
            .expect("lock")
            .scans
            .values()
            .find(|s| s.status == ScanStatus::Running)
            .cloned())
    }

    async fn update_progress(
        &self,
        scan_id: ScanId,
        counters: ScanCounters,
        current_root: Option<String>,
        current_path: Option<String>,
    ) -> CoreResult<()> {
        let mut inner = self.inner.lock().expect("lock");
        let scan = inner
            .scans
            .get_mut(&scan_id)
            .ok_or_else(|| CoreError::NotFound(format!("scan {scan_id}")))?;
        scan.counters = counters;
        scan.current_root = current_root;
        scan.current_path = current_path;
        Ok(())
    }

    async fn complete(&self, scan_id: ScanId, completed_at: DateTime<Utc>) -> CoreResult<()> {
        self.finish(scan_id, ScanStatus::Completed, completed_at)
    }

    async fn cancel(&self, scan_id: ScanId, completed_at: DateTime<Utc>) -> CoreResult<()> {
        self.finish(scan_id, ScanStatus::Cancelled, completed_at)
    }

    async fn fail(&self, scan_id: ScanId, completed_at: DateTime<Utc>) -> CoreResult<()> {
        self.finish(scan_id, ScanStatus::Failed, completed_at)
    }

    async fn cancel_all_running(&self, completed_at: DateTime<Utc>) -> CoreResult<()> {
        let mut inner = self.inner.lock().expect("lock");
        for scan in inner.scans.values_mut() {
            if scan.status == ScanStatus::Running {
                scan.status = ScanStatus::Cancelled;
                scan.completed_at = Some(completed_at);
            }
        }
        Ok(())
    }
}

impl InMemoryStore {
    fn finish(&self, scan_id: ScanId, status: ScanStatus, completed_at: DateTime<Utc>) -> CoreResult<()> {
        let mut inner = self.inner.lock().expect("lock");
        let scan = inner
            .scans
            .get_mut(&scan_id)
            .ok_or_else(|| CoreError::NotFound(format!("scan {scan_id}")))?;
        scan.status = status;
        scan.completed_at = Some(completed_at);
        Ok(())
    }
}

#[async_trait]
impl StorageRootStore for InMemoryStore {
    async fn list(&self) -> CoreResult<Vec<StorageRoot>> {
        Ok(self.inner.lock().expect("lock").roots.clone())
    }
}
