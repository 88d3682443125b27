use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scenevault_model::{
    DerivedArtifacts, FingerprintKind, FingerprintRow, JobId, JobRecord, JobStatus, MediaProbe,
    ProcessingPhase, ProcessingStatus, ScanCounters, ScanId, ScanRecord, ScanStatus, Scene, SceneId,
    SceneUuid, StorageRoot, StorageRootId,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

use super::ports::{
    ClaimedScene, FingerprintStore, JobLedgerStore, ScanRecordStore, SceneMutation, SceneStore,
    StorageRootStore,
};

/// Postgres-backed implementation of every repository port. Uses the
/// dynamic `sqlx::query`/`query_as`/`query_scalar` entry points rather than
/// the compile-time `query!` macros, since there is no live database to
/// check queries against at build time.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresStore")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresStore {
    /// Connects and verifies the schema is migrated before returning. The
    /// caller is expected to have already run the crate's migrations; this
    /// only checks that the table the claim protocol depends on exists, so
    /// misconfiguration fails fast at startup rather than on first claim.
    pub async fn connect(pool: PgPool) -> CoreResult<Self> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| CoreError::Transient(format!("postgres health check failed: {e}")))?;

        let scenes_table_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'scenes')",
        )
        .fetch_one(&pool)
        .await?;

        if !scenes_table_exists {
            return Err(CoreError::Conflict(
                "scenes table is missing; run migrations before starting".to_string(),
            ));
        }

        Ok(Self { pool })
    }
}

fn status_to_text(status: ProcessingStatus) -> &'static str {
    match status {
        ProcessingStatus::Pending => "pending",
        ProcessingStatus::Processing => "processing",
        ProcessingStatus::Ready => "ready",
        ProcessingStatus::Failed => "failed",
        ProcessingStatus::Trashed => "trashed",
    }
}

fn status_from_text(text: &str) -> CoreResult<ProcessingStatus> {
    Ok(match text {
        "pending" => ProcessingStatus::Pending,
        "processing" => ProcessingStatus::Processing,
        "ready" => ProcessingStatus::Ready,
        "failed" => ProcessingStatus::Failed,
        "trashed" => ProcessingStatus::Trashed,
        other => return Err(CoreError::IntegrityFailed(format!("unknown processing_status '{other}'"))),
    })
}

fn phase_to_text(phase: ProcessingPhase) -> &'static str {
    match phase {
        ProcessingPhase::Metadata => "metadata",
        ProcessingPhase::Thumbnail => "thumbnail",
        ProcessingPhase::Sprites => "sprites",
        ProcessingPhase::Preview => "preview",
        ProcessingPhase::Fingerprint => "fingerprint",
    }
}

fn phase_from_text(text: &str) -> CoreResult<ProcessingPhase> {
    Ok(match text {
        "metadata" => ProcessingPhase::Metadata,
        "thumbnail" => ProcessingPhase::Thumbnail,
        "sprites" => ProcessingPhase::Sprites,
        "preview" => ProcessingPhase::Preview,
        "fingerprint" => ProcessingPhase::Fingerprint,
        other => return Err(CoreError::IntegrityFailed(format!("unknown processing_phase '{other}'"))),
    })
}

fn phase_from_opt_text(text: Option<&str>) -> CoreResult<Option<ProcessingPhase>> {
    text.map(phase_from_text).transpose()
}

fn job_status_to_text(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
        JobStatus::Cancelled => "cancelled",
    }
}

fn job_status_from_text(text: &str) -> CoreResult<JobStatus> {
    Ok(match text {
        "running" => JobStatus::Running,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        "cancelled" => JobStatus::Cancelled,
        other => return Err(CoreError::IntegrityFailed(format!("unknown job_status '{other}'"))),
    })
}

fn scan_status_to_text(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Running => "running",
        ScanStatus::Completed => "completed",
        ScanStatus::Failed => "failed",
        ScanStatus::Cancelled => "cancelled",
    }
}

fn scan_status_from_text(text: &str) -> CoreResult<ScanStatus> {
    Ok(match text {
        "running" => ScanStatus::Running,
        "completed" => ScanStatus::Completed,
        "failed" => ScanStatus::Failed,
        "cancelled" => ScanStatus::Cancelled,
        other => return Err(CoreError::IntegrityFailed(format!("unknown scan_status '{other}'"))),
    })
}

#[derive(sqlx::FromRow)]
struct SceneRow {
    id: i64,
    uuid: Uuid,
    path: String,
    size_bytes: i64,
    content_hash: String,
    original_filename: String,
    title: String,
    duration_secs: Option<f64>,
    width: Option<i32>,
    height: Option<i32>,
    frame_rate: Option<f64>,
    video_codec: Option<String>,
    audio_codec: Option<String>,
    thumbnail_path: Option<String>,
    sprite_sheet_path: Option<String>,
    sprite_cue_path: Option<String>,
    preview_path: Option<String>,
    processing_status: String,
    processing_phase: Option<String>,
    processing_error: Option<String>,
    trashed_at: Option<DateTime<Utc>>,
    trash_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SceneRow {
    fn into_scene(self) -> CoreResult<Scene> {
        Ok(Scene {
            id: SceneId(self.id),
            uuid: SceneUuid(self.uuid),
            path: self.path,
            size_bytes: self.size_bytes as u64,
            content_hash: self.content_hash,
            original_filename: self.original_filename,
            title: self.title,
            probe: MediaProbe {
                duration_secs: self.duration_secs,
                width: self.width,
                height: self.height,
                frame_rate: self.frame_rate,
                video_codec: self.video_codec,
                audio_codec: self.audio_codec,
            },
            artifacts: DerivedArtifacts {
                thumbnail_path: self.thumbnail_path,
                sprite_sheet_path: self.sprite_sheet_path,
                sprite_cue_path: self.sprite_cue_path,
                preview_path: self.preview_path,
            },
            processing_status: status_from_text(&self.processing_status)?,
            processing_phase: phase_from_opt_text(self.processing_phase.as_deref())?,
            processing_error: self.processing_error,
            trashed_at: self.trashed_at,
            trash_expires_at: self.trash_expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SCENE_COLUMNS: &str = "id, uuid, path, size_bytes, content_hash, original_filename, title, \
    duration_secs, width, height, frame_rate, video_codec, audio_codec, \
    thumbnail_path, sprite_sheet_path, sprite_cue_path, preview_path, \
    processing_status, processing_phase, processing_error, \
    trashed_at, trash_expires_at, created_at, updated_at";

#[async_trait]
impl SceneStore for PostgresStore {
    async fn get(&self, scene_id: SceneId) -> CoreResult<Option<Scene>> {
        let row = sqlx::query_as::<_, SceneRow>(&format!("SELECT {SCENE_COLUMNS} FROM scenes WHERE id = $1"))
            .bind(scene_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(SceneRow::into_scene).transpose()
    }

    async fn list_by_status(&self, status: ProcessingStatus) -> CoreResult<Vec<Scene>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM scenes WHERE processing_status = $1 ORDER BY id")
            .bind(status_to_text(status))
            .fetch_all(&self.pool)
            .await?;
        let mut scenes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(scene) = self.get(SceneId(id)).await? {
                scenes.push(scene);
            }
        }
        Ok(scenes)
    }

    async fn find_by_content_hash(&self, content_hash: &str) -> CoreResult<Option<Scene>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM scenes WHERE content_hash = $1")
            .bind(content_hash)
            .fetch_optional(&self.pool)
            .await?;
        match id {
            Some(id) => self.get(SceneId(id)).await,
            None => Ok(None),
        }
    }

    async fn create_scene(
        &self,
        path: &str,
        size_bytes: u64,
        content_hash: &str,
        original_filename: &str,
    ) -> CoreResult<Scene> {
        let uuid = Uuid::now_v7();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO scenes (uuid, path, size_bytes, content_hash, original_filename, title,
                                 processing_status, processing_phase, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5, 'pending', 'metadata', NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(uuid)
        .bind(path)
        .bind(size_bytes as i64)
        .bind(content_hash)
        .bind(original_filename)
        .fetch_one(&self.pool)
        .await?;

        self.get(SceneId(id))
            .await?
            .ok_or_else(|| CoreError::IntegrityFailed("scene vanished immediately after insert".to_string()))
    }

    async fn update_path(&self, scene_id: SceneId, new_path: &str) -> CoreResult<()> {
        let result = sqlx::query("UPDATE scenes SET path = $2, updated_at = NOW() WHERE id = $1")
            .bind(scene_id.0)
            .bind(new_path)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("scene {scene_id}")));
        }
        Ok(())
    }

    async fn claim_next_pending(&self, phase: ProcessingPhase) -> CoreResult<Option<ClaimedScene>> {
        // SKIP LOCKED means a racing worker never blocks on this row; it
        // just moves on to the next pending candidate.
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE scenes
            SET processing_status = 'processing', updated_at = NOW()
            WHERE id = (
                SELECT id FROM scenes
                WHERE processing_status = 'pending' AND processing_phase = $1
                ORDER BY id
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id
            "#,
        )
        .bind(phase_to_text(phase))
        .fetch_optional(&self.pool)
        .await?;

        match id {
            Some(id) => Ok(self.get(SceneId(id)).await?.map(|scene| ClaimedScene { scene })),
            None => Ok(None),
        }
    }

    async fn claim_scene(
        &self,
        scene_id: SceneId,
        phase: ProcessingPhase,
    ) -> CoreResult<Option<ClaimedScene>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE scenes
            SET processing_status = 'processing', updated_at = NOW()
            WHERE id = $1
              AND processing_phase = $2
              AND processing_status IN ('pending', 'processing')
            RETURNING id
            "#,
        )
        .bind(scene_id.0)
        .bind(phase_to_text(phase))
        .fetch_optional(&self.pool)
        .await?;

        match id {
            Some(id) => Ok(self.get(SceneId(id)).await?.map(|scene| ClaimedScene { scene })),
            None => Ok(None),
        }
    }

    async fn complete_phase(
        &self,
        scene_id: SceneId,
        phase: ProcessingPhase,
        mutation: SceneMutation,
    ) -> CoreResult<Scene> {
        let mut tx = self.pool.begin().await?;

        let current_phase: Option<String> =
            sqlx::query_scalar("SELECT processing_phase FROM scenes WHERE id = $1 FOR UPDATE")
                .bind(scene_id.0)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("scene {scene_id}")))?;

        if current_phase.as_deref() != Some(phase_to_text(phase)) {
            return Err(CoreError::Conflict(format!("scene {scene_id} is not at phase {phase:?}")));
        }

        let (next_status, next_phase) = match phase.next() {
            Some(next) => (status_to_text(ProcessingStatus::Pending), Some(phase_to_text(next))),
            None => (status_to_text(ProcessingStatus::Ready), None),
        };

        sqlx::query(
            r#"
            UPDATE scenes SET
                duration_secs = COALESCE($2, duration_secs),
                width = COALESCE($3, width),
                height = COALESCE($4, height),
                frame_rate = COALESCE($5, frame_rate),
                video_codec = COALESCE($6, video_codec),
                audio_codec = CASE WHEN $7 THEN $8 ELSE audio_codec END,
                thumbnail_path = COALESCE($9, thumbnail_path),
                sprite_sheet_path = COALESCE($10, sprite_sheet_path),
                sprite_cue_path = COALESCE($11, sprite_cue_path),
                preview_path = COALESCE($12, preview_path),
                processing_status = $13,
                processing_phase = $14,
                processing_error = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(scene_id.0)
        .bind(mutation.duration_secs)
        .bind(mutation.width)
        .bind(mutation.height)
        .bind(mutation.frame_rate)
        .bind(mutation.video_codec)
        .bind(mutation.audio_codec.is_some())
        .bind(mutation.audio_codec.flatten())
        .bind(mutation.thumbnail_path)
        .bind(mutation.sprite_sheet_path)
        .bind(mutation.sprite_cue_path)
        .bind(mutation.preview_path)
        .bind(next_status)
        .bind(next_phase)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get(scene_id)
            .await?
            .ok_or_else(|| CoreError::IntegrityFailed(format!("scene {scene_id} vanished mid-update")))
    }

    async fn fail_phase(&self, scene_id: SceneId, phase: ProcessingPhase, error_message: &str) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE scenes
            SET processing_status = 'failed', processing_phase = $2, processing_error = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(scene_id.0)
        .bind(phase_to_text(phase))
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("scene {scene_id}")));
        }
        Ok(())
    }

    async fn revert_to_pending(&self, scene_id: SceneId) -> CoreResult<()> {
        let result = sqlx::query("UPDATE scenes SET processing_status = 'pending', updated_at = NOW() WHERE id = $1")
            .bind(scene_id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("scene {scene_id}")));
        }
        Ok(())
    }

    async fn list_processing(&self) -> CoreResult<Vec<Scene>> {
        self.list_by_status(ProcessingStatus::Processing).await
    }

    async fn trash(&self, scene_id: SceneId, retention_days: i64, now: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE scenes
            SET processing_status = 'trashed', trashed_at = $2, trash_expires_at = $2 + ($3 || ' days')::interval, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(scene_id.0)
        .bind(now)
        .bind(retention_days.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("scene {scene_id}")));
        }
        Ok(())
    }

    async fn purge_expired_trash(&self, now: DateTime<Utc>) -> CoreResult<Vec<SceneId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("DELETE FROM scenes WHERE trash_expires_at IS NOT NULL AND trash_expires_at <= $1 RETURNING id")
                .bind(now)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().map(SceneId).collect())
    }
}

#[async_trait]
impl JobLedgerStore for PostgresStore {
    async fn begin(&self, scene_id: SceneId, phase: ProcessingPhase) -> CoreResult<JobRecord> {
        let job_id = Uuid::now_v7();
        let started_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO job_ledger (job_id, scene_id, phase, status, started_at)
            VALUES ($1, $2, $3, 'running', NOW())
            RETURNING started_at
            "#,
        )
        .bind(job_id)
        .bind(scene_id.0)
        .bind(phase_to_text(phase))
        .fetch_one(&self.pool)
        .await?;

        Ok(JobRecord {
            job_id: JobId(job_id),
            scene_id,
            phase,
            status: JobStatus::Running,
            started_at,
            completed_at: None,
            error_message: None,
        })
    }

    async fn complete(&self, job_id: JobId) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE job_ledger SET status = 'completed', completed_at = NOW() WHERE job_id = $1",
        )
        .bind(job_id.0)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("job {job_id}")));
        }
        Ok(())
    }

    async fn fail(&self, job_id: JobId, error_message: &str) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE job_ledger SET status = 'failed', completed_at = NOW(), error_message = $2 WHERE job_id = $1",
        )
        .bind(job_id.0)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("job {job_id}")));
        }
        Ok(())
    }

    async fn cancel(&self, job_id: JobId, reason: &str) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE job_ledger SET status = 'cancelled', completed_at = NOW(), error_message = $2 WHERE job_id = $1",
        )
        .bind(job_id.0)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("job {job_id}")));
        }
        Ok(())
    }

    async fn list(&self, offset: u64, limit: u64) -> CoreResult<Vec<JobRecord>> {
        let rows = sqlx::query_as::<_, (Uuid, i64, String, String, DateTime<Utc>, Option<DateTime<Utc>>, Option<String>)>(
            r#"
            SELECT job_id, scene_id, phase, status, started_at, completed_at, error_message
            FROM job_ledger
            ORDER BY started_at DESC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(offset as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(job_id, scene_id, phase, status, started_at, completed_at, error_message)| {
                Ok(JobRecord {
                    job_id: JobId(job_id),
                    scene_id: SceneId(scene_id),
                    phase: phase_from_text(&phase)?,
                    status: job_status_from_text(&status)?,
                    started_at,
                    completed_at,
                    error_message,
                })
            })
            .collect()
    }

    async fn active(&self) -> CoreResult<Vec<JobRecord>> {
        let rows = sqlx::query_as::<_, (Uuid, i64, String, String, DateTime<Utc>, Option<DateTime<Utc>>, Option<String>)>(
            r#"
            SELECT job_id, scene_id, phase, status, started_at, completed_at, error_message
            FROM job_ledger
            WHERE status = 'running'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(job_id, scene_id, phase, status, started_at, completed_at, error_message)| {
                Ok(JobRecord {
                    job_id: JobId(job_id),
                    scene_id: SceneId(scene_id),
                    phase: phase_from_text(&phase)?,
                    status: job_status_from_text(&status)?,
                    started_at,
                    completed_at,
                    error_message,
                })
            })
            .collect()
    }

    async fn cancel_all_running(&self, reason: &str) -> CoreResult<Vec<JobRecord>> {
        let rows = sqlx::query_as::<_, (Uuid, i64, String, String, DateTime<Utc>, Option<DateTime<Utc>>, Option<String>)>(
            r#"
            UPDATE job_ledger
            SET status = 'cancelled', completed_at = NOW(), error_message = $1
            WHERE status = 'running'
            RETURNING job_id, scene_id, phase, status, started_at, completed_at, error_message
            "#,
        )
        .bind(reason)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(job_id, scene_id, phase, status, started_at, completed_at, error_message)| {
                Ok(JobRecord {
                    job_id: JobId(job_id),
                    scene_id: SceneId(scene_id),
                    phase: phase_from_text(&phase)?,
                    status: job_status_from_text(&status)?,
                    started_at,
                    completed_at,
                    error_message,
                })
            })
            .collect()
    }

    async fn sweep(&self, older_than: DateTime<Utc>) -> CoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM job_ledger WHERE status != 'running' AND completed_at < $1",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FingerprintStore for PostgresStore {
    async fn replace_for_scene(
        &self,
        scene_id: SceneId,
        kind: FingerprintKind,
        rows: Vec<FingerprintRow>,
    ) -> CoreResult<()> {
        let kind_text = match kind {
            FingerprintKind::Audio => "audio",
            FingerprintKind::Visual => "visual",
        };
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM fingerprints WHERE scene_id = $1 AND kind = $2")
            .bind(scene_id.0)
            .bind(kind_text)
            .execute(&mut *tx)
            .await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO fingerprints (scene_id, kind, position, hash) VALUES ($1, $2, $3, $4)",
            )
            .bind(scene_id.0)
            .bind(kind_text)
            .bind(row.position as i64)
            .bind(row.hash as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn for_scene(&self, scene_id: SceneId, kind: FingerprintKind) -> CoreResult<Vec<FingerprintRow>> {
        let kind_text = match kind {
            FingerprintKind::Audio => "audio",
            FingerprintKind::Visual => "visual",
        };
        let rows = sqlx::query_as::<_, (i64, i64)>(
            "SELECT position, hash FROM fingerprints WHERE scene_id = $1 AND kind = $2 ORDER BY position",
        )
        .bind(scene_id.0)
        .bind(kind_text)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(position, hash)| FingerprintRow {
                scene_id,
                kind,
                position: position as u32,
                hash: hash as u64,
            })
            .collect())
    }

    async fn all(&self, kind: FingerprintKind) -> CoreResult<Vec<FingerprintRow>> {
        let kind_text = match kind {
            FingerprintKind::Audio => "audio",
            FingerprintKind::Visual => "visual",
        };
        let rows = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT scene_id, position, hash FROM fingerprints WHERE kind = $1",
        )
        .bind(kind_text)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(scene_id, position, hash)| FingerprintRow {
                scene_id: SceneId(scene_id),
                kind,
                position: position as u32,
                hash: hash as u64,
            })
            .collect())
    }

    async fn delete_for_scene(&self, scene_id: SceneId) -> CoreResult<()> {
        sqlx::query("DELETE FROM fingerprints WHERE scene_id = $1")
            .bind(scene_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ScanRecordStore for PostgresStore {
    async fn create_running(&self, scan_id: ScanId, started_at: DateTime<Utc>) -> CoreResult<ScanRecord> {
        sqlx::query(
            r#"
            INSERT INTO scans (id, status, files_found, scenes_added, scenes_skipped, errors, started_at)
            VALUES ($1, 'running', 0, 0, 0, 0, $2)
            "#,
        )
        .bind(scan_id.0)
        .bind(started_at)
        .execute(&self.pool)
        .await?;
        Ok(ScanRecord::new_running(scan_id, started_at))
    }

    async fn get(&self, scan_id: ScanId) -> CoreResult<Option<ScanRecord>> {
        let row = sqlx::query_as::<_, (
            Uuid, String, i64, i64, i64, i64, Option<String>, Option<String>, DateTime<Utc>, Option<DateTime<Utc>>,
        )>(
            r#"
            SELECT id, status, files_found, scenes_added, scenes_skipped, errors,
                   current_root, current_path, started_at, completed_at
            FROM scans WHERE id = $1
            "#,
        )
        .bind(scan_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, status, files_found, scenes_added, scenes_skipped, errors, current_root, current_path, started_at, completed_at)| {
            Ok(ScanRecord {
                id: ScanId(id),
                status: scan_status_from_text(&status)?,
                counters: ScanCounters {
                    files_found: files_found as u64,
                    scenes_added: scenes_added as u64,
                    scenes_skipped: scenes_skipped as u64,
                    errors: errors as u64,
                },
                current_root,
                current_path,
                started_at,
                completed_at,
            })
        })
        .transpose()
    }

    async fn get_running(&self) -> CoreResult<Option<ScanRecord>> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM scans WHERE status = 'running' LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        match id {
            Some(id) => self.get(ScanId(id)).await,
            None => Ok(None),
        }
    }

    async fn update_progress(
        &self,
        scan_id: ScanId,
        counters: ScanCounters,
        current_root: Option<String>,
        current_path: Option<String>,
    ) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE scans
            SET files_found = $2, scenes_added = $3, scenes_skipped = $4, errors = $5,
                current_root = $6, current_path = $7
            WHERE id = $1
            "#,
        )
        .bind(scan_id.0)
        .bind(counters.files_found as i64)
        .bind(counters.scenes_added as i64)
        .bind(counters.scenes_skipped as i64)
        .bind(counters.errors as i64)
        .bind(current_root)
        .bind(current_path)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("scan {scan_id}")));
        }
        Ok(())
    }

    async fn complete(&self, scan_id: ScanId, completed_at: DateTime<Utc>) -> CoreResult<()> {
        self.finish(scan_id, ScanStatus::Completed, completed_at).await
    }

    async fn cancel(&self, scan_id: ScanId, completed_at: DateTime<Utc>) -> CoreResult<()> {
        self.finish(scan_id, ScanStatus::Cancelled, completed_at).await
    }

    async fn fail(&self, scan_id: ScanId, completed_at: DateTime<Utc>) -> CoreResult<()> {
        self.finish(scan_id, ScanStatus::Failed, completed_at).await
    }

    async fn cancel_all_running(&self, completed_at: DateTime<Utc>) -> CoreResult<()> {
        sqlx::query("UPDATE scans SET status = 'cancelled', completed_at = $1 WHERE status = 'running'")
            .bind(completed_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl PostgresStore {
    async fn finish(&self, scan_id: ScanId, status: ScanStatus, completed_at: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query("UPDATE scans SET status = $2, completed_at = $3 WHERE id = $1")
            .bind(scan_id.0)
            .bind(scan_status_to_text(status))
            .bind(completed_at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("scan {scan_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageRootStore for PostgresStore {
    async fn list(&self) -> CoreResult<Vec<StorageRoot>> {
        let rows = sqlx::query_as::<_, (i64, String, String, bool)>(
            "SELECT id, display_name, path, is_default FROM storage_roots ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, display_name, path, is_default)| StorageRoot {
                id: StorageRootId(id),
                display_name,
                path,
                is_default,
            })
            .collect())
    }
}
