use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{JobId, SceneId};
use crate::scene::ProcessingPhase;

/// Terminal/in-flight state of a single Job Ledger attempt row.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Append-only Job Ledger row: one per (scene, phase, attempt).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub scene_id: SceneId,
    pub phase: ProcessingPhase,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl JobRecord {
    pub fn new_running(scene_id: SceneId, phase: ProcessingPhase, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id: JobId::new(),
            scene_id,
            phase,
            status: JobStatus::Running,
            started_at,
            completed_at: None,
            error_message: None,
        }
    }
}
