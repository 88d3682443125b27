mod memory;
mod ports;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::InMemoryStore;
pub use ports::{
    ClaimedScene, FingerprintStore, JobLedgerStore, ScanRecordStore, SceneMutation, SceneStore,
    StorageRootStore,
};
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
