use std::sync::Arc;

use async_trait::async_trait;
use scenevault_core::{
    Clock, FingerprintSample, InMemoryStore, InProcEventBus, JobLedger, PhaseScheduler,
    ProbeOutput, Scanner, SceneEnqueuer, SpriteOutput, SystemClock, Transcoder,
};
use scenevault_core::scanner::InMemoryFs;
use scenevault_server::app_state::AppState;
use scenevault_server::config::ServerConfig;
use tokio_util::sync::CancellationToken;

pub const TEST_TOKEN: &str = "test-token";

/// Transcoder stand-in for route tests: every operation is unreachable from
/// these tests (no scene ever leaves `pending`), but `PhaseScheduler::new`
/// still needs a concrete `Arc<dyn Transcoder>` to construct.
struct NullTranscoder;

#[async_trait]
impl Transcoder for NullTranscoder {
    async fn probe(&self, _source_path: &str, _cancel: CancellationToken) -> scenevault_core::CoreResult<ProbeOutput> {
        unreachable!("route tests never advance a scene far enough to probe it")
    }

    async fn extract_thumbnail(
        &self,
        _source_path: &str,
        _output_path: &str,
        _duration_secs: f64,
        _cancel: CancellationToken,
    ) -> scenevault_core::CoreResult<()> {
        unreachable!()
    }

    async fn generate_sprites(
        &self,
        _source_path: &str,
        _sheet_path: &str,
        _duration_secs: f64,
        _cancel: CancellationToken,
    ) -> scenevault_core::CoreResult<SpriteOutput> {
        unreachable!()
    }

    async fn render_preview(
        &self,
        _source_path: &str,
        _output_path: &str,
        _duration_secs: f64,
        _cancel: CancellationToken,
    ) -> scenevault_core::CoreResult<()> {
        unreachable!()
    }

    async fn compute_audio_fingerprint(
        &self,
        _source_path: &str,
        _cancel: CancellationToken,
    ) -> scenevault_core::CoreResult<Vec<FingerprintSample>> {
        unreachable!()
    }

    async fn compute_visual_fingerprint(
        &self,
        _source_path: &str,
        _cancel: CancellationToken,
    ) -> scenevault_core::CoreResult<Vec<FingerprintSample>> {
        unreachable!()
    }
}

/// Builds an `AppState` wired entirely over `InMemoryStore`/`InMemoryFs`
/// instead of a live Postgres connection and a real filesystem.
pub async fn test_state() -> AppState {
    let store = Arc::new(InMemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let bus = Arc::new(InProcEventBus::default());
    let transcoder = Arc::new(NullTranscoder);
    let ledger = Arc::new(JobLedger::new(store.clone(), clock.clone()));
    let root_token = CancellationToken::new();

    let scheduler = PhaseScheduler::new(
        store.clone(),
        store.clone(),
        ledger.clone(),
        bus.clone(),
        transcoder,
        clock.clone(),
        scenevault_core::CoreConfig::default(),
        std::env::temp_dir().to_string_lossy().into_owned(),
        root_token.clone(),
    );

    let enqueuer: Arc<dyn SceneEnqueuer> = scheduler.clone();
    let fs = Arc::new(InMemoryFs::new());
    let scanner = Scanner::new(fs, store.clone(), store.clone(), store.clone(), bus.clone(), enqueuer, clock);

    let config = ServerConfig::for_tests();

    AppState {
        scheduler,
        scanner,
        ledger,
        bus,
        config: Arc::new(config),
    }
}
