use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ScanId;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Live counters tracked while a scan executes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounters {
    pub files_found: u64,
    pub scenes_added: u64,
    pub scenes_skipped: u64,
    pub errors: u64,
}

/// A single scan execution over the registered storage roots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: ScanId,
    pub status: ScanStatus,
    pub counters: ScanCounters,
    pub current_root: Option<String>,
    pub current_path: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScanRecord {
    pub fn new_running(id: ScanId, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: ScanStatus::Running,
            counters: ScanCounters::default(),
            current_root: None,
            current_path: None,
            started_at,
            completed_at: None,
        }
    }
}
