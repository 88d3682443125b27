//! Shared data model definitions for the SceneVault processing pipeline.
#![allow(missing_docs)]

pub mod event;
pub mod fingerprint;
pub mod ids;
pub mod prelude;
pub mod scan;
pub mod scene;
pub mod storage_root;
pub mod job;

pub use event::{Event, EventPayload};
pub use fingerprint::{FingerprintKind, FingerprintRow};
pub use ids::{JobId, SceneId, SceneUuid, ScanId, StorageRootId};
pub use job::{JobRecord, JobStatus};
pub use scan::{ScanCounters, ScanRecord, ScanStatus};
pub use scene::{DerivedArtifacts, MediaProbe, ProcessingPhase, ProcessingStatus, Scene};
pub use storage_root::StorageRoot;
