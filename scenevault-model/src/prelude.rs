//! Convenience re-export for downstream crates: `use scenevault_model::prelude::*;`
pub use crate::event::{Event, EventPayload};
pub use crate::fingerprint::{FingerprintKind, FingerprintRow};
pub use crate::ids::{JobId, SceneId, SceneUuid, ScanId, StorageRootId};
pub use crate::job::{JobRecord, JobStatus};
pub use crate::scan::{ScanCounters, ScanRecord, ScanStatus};
pub use crate::scene::{
    DerivedArtifacts, MediaProbe, ProcessingPhase, ProcessingStatus, Scene,
};
pub use crate::storage_root::StorageRoot;
