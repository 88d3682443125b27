use std::sync::Arc;

use scenevault_core::{EventBus, JobLedger, PhaseScheduler, Scanner};

use crate::config::ServerConfig;

/// Shared process state handed to every handler. Holds the process-wide
/// singletons constructed once in `main`: one `PhaseScheduler`, one
/// `Scanner`, the event bus and the ledger façade.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<PhaseScheduler>,
    pub scanner: Arc<Scanner>,
    pub ledger: Arc<JobLedger>,
    pub bus: Arc<dyn EventBus>,
    pub config: Arc<ServerConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
