use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SceneId, SceneUuid};

/// Lifecycle state of a [`Scene`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Ready,
    Failed,
    Trashed,
}

/// Ordered processing phases. The order here *is* the phase order the
/// scheduler enforces; nothing outside this module may reorder it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingPhase {
    Metadata,
    Thumbnail,
    Sprites,
    Preview,
    Fingerprint,
}

impl ProcessingPhase {
    /// Full phase order, metadata first.
    pub const ORDER: [ProcessingPhase; 5] = [
        ProcessingPhase::Metadata,
        ProcessingPhase::Thumbnail,
        ProcessingPhase::Sprites,
        ProcessingPhase::Preview,
        ProcessingPhase::Fingerprint,
    ];

    /// The phase that follows this one, or `None` if this is the last phase
    /// (completing it moves the scene to `status=ready`, `phase=None`).
    pub fn next(self) -> Option<ProcessingPhase> {
        let idx = Self::ORDER.iter().position(|p| *p == self)?;
        Self::ORDER.get(idx + 1).copied()
    }

    pub fn index(self) -> usize {
        Self::ORDER.iter().position(|p| *p == self).expect("exhaustive ORDER")
    }
}

/// Probed technical attributes, populated by the metadata phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    pub duration_secs: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub frame_rate: Option<f64>,
    pub video_codec: Option<String>,
    /// `None` means silent (no audio stream).
    pub audio_codec: Option<String>,
}

/// Derived artifact paths written by the pipeline phases.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedArtifacts {
    pub thumbnail_path: Option<String>,
    pub sprite_sheet_path: Option<String>,
    pub sprite_cue_path: Option<String>,
    pub preview_path: Option<String>,
}

impl DerivedArtifacts {
    /// True once every artifact the full pipeline produces is present.
    /// Used to decide whether a scene can transition to `status=ready`.
    pub fn is_complete(&self) -> bool {
        self.thumbnail_path.is_some()
            && self.sprite_sheet_path.is_some()
            && self.sprite_cue_path.is_some()
            && self.preview_path.is_some()
    }
}

/// A processable media item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub uuid: SceneUuid,
    pub path: String,
    pub size_bytes: u64,
    pub content_hash: String,
    pub original_filename: String,
    pub title: String,
    pub probe: MediaProbe,
    pub artifacts: DerivedArtifacts,
    pub processing_status: ProcessingStatus,
    pub processing_phase: Option<ProcessingPhase>,
    pub processing_error: Option<String>,
    pub trashed_at: Option<DateTime<Utc>>,
    pub trash_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Scene {
    /// Spec §3 invariant: `status=ready` iff every artifact exists and the
    /// scene has left the phase pipeline.
    pub fn invariant_ready_holds(&self) -> bool {
        match self.processing_status {
            ProcessingStatus::Ready => {
                self.artifacts.is_complete() && self.processing_phase.is_none()
            }
            _ => true,
        }
    }
}
