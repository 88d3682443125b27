//! Video processing pipeline core: Phase Scheduler, Duplicate Detector,
//! Scanner, Job Ledger and Event Bus for the SceneVault media server.

pub mod clock;
pub mod config;
pub mod dedup;
pub mod enqueue;
pub mod error;
pub mod events;
pub mod ledger;
pub mod paths;
pub mod scanner;
pub mod scheduler;
pub mod store;
pub mod transcoder;
pub mod trash;
pub mod vtt;

pub use clock::{Clock, SystemClock};
pub use config::{CoreConfig, DetectorConfig, FingerprintMode, PoolConfig, RetentionConfig};
pub use dedup::{DuplicateDetector, DuplicateGroup, MatchedPair, SceneSummary};
pub use enqueue::SceneEnqueuer;
pub use error::{CoreError, CoreResult};
pub use events::{EventBus, EventSubscription, InProcEventBus};
pub use ledger::JobLedger;
pub use paths::ArtifactPaths;
pub use scanner::Scanner;
pub use scheduler::{PhaseScheduler, PhaseStatus, SchedulerStatus};
pub use store::{
    ClaimedScene, FingerprintStore, InMemoryStore, JobLedgerStore, ScanRecordStore, SceneMutation,
    SceneStore, StorageRootStore,
};
#[cfg(feature = "postgres")]
pub use store::PostgresStore;
pub use transcoder::{FingerprintSample, ProbeOutput, SpriteOutput, SpriteTile, Transcoder};
pub use trash::spawn_trash_sweeper;
