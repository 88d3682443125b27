use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{JobId, SceneId, ScanId};
use crate::scan::ScanCounters;
use crate::scene::ProcessingPhase;

/// Lifecycle event payloads delivered by the Event Bus.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    #[serde(rename = "scene.added")]
    SceneAdded { scene_id: SceneId },
    #[serde(rename = "scene.updated")]
    SceneUpdated { scene_id: SceneId },
    #[serde(rename = "scene.deleted")]
    SceneDeleted { scene_id: SceneId },

    #[serde(rename = "job.started")]
    JobStarted {
        job_id: JobId,
        scene_id: SceneId,
        phase: ProcessingPhase,
    },
    #[serde(rename = "job.progress")]
    JobProgress {
        job_id: JobId,
        scene_id: SceneId,
        phase: ProcessingPhase,
        message: String,
    },
    #[serde(rename = "job.completed")]
    JobCompleted {
        job_id: JobId,
        scene_id: SceneId,
        phase: ProcessingPhase,
    },
    #[serde(rename = "job.failed")]
    JobFailed {
        job_id: JobId,
        scene_id: SceneId,
        phase: ProcessingPhase,
        error: String,
    },
    #[serde(rename = "job.cancelled")]
    JobCancelled {
        job_id: JobId,
        scene_id: SceneId,
        phase: ProcessingPhase,
    },

    #[serde(rename = "scan.progress")]
    ScanProgress {
        scan_id: ScanId,
        counters: ScanCounters,
        current_path: Option<String>,
    },
    #[serde(rename = "scan.completed")]
    ScanCompleted {
        scan_id: ScanId,
        counters: ScanCounters,
    },
    #[serde(rename = "scan.failed")]
    ScanFailed { scan_id: ScanId, error: String },
    #[serde(rename = "scan.cancelled")]
    ScanCancelled {
        scan_id: ScanId,
        counters: ScanCounters,
    },
}

impl EventPayload {
    /// The wire `event:` name used by the SSE bridge; matches the
    /// `#[serde(rename = ...)]` tag above so producers and the HTTP layer
    /// never drift.
    pub fn event_name(&self) -> &'static str {
        match self {
            EventPayload::SceneAdded { .. } => "scene.added",
            EventPayload::SceneUpdated { .. } => "scene.updated",
            EventPayload::SceneDeleted { .. } => "scene.deleted",
            EventPayload::JobStarted { .. } => "job.started",
            EventPayload::JobProgress { .. } => "job.progress",
            EventPayload::JobCompleted { .. } => "job.completed",
            EventPayload::JobFailed { .. } => "job.failed",
            EventPayload::JobCancelled { .. } => "job.cancelled",
            EventPayload::ScanProgress { .. } => "scan.progress",
            EventPayload::ScanCompleted { .. } => "scan.completed",
            EventPayload::ScanFailed { .. } => "scan.failed",
            EventPayload::ScanCancelled { .. } => "scan.cancelled",
        }
    }
}

/// Envelope wrapping every event published on the bus: `{type, timestamp, payload}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self { timestamp, payload }
    }
}
