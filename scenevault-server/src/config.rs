use std::env;

use clap::Parser;
use scenevault_core::{CoreConfig, FingerprintMode};

/// Process-wide configuration loaded from the environment (and optionally a
/// `.env` file via `dotenvy`).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub events_token: String,
    pub storage_base_dir: String,
    pub shutdown_grace_secs: u64,
    pub core: CoreConfig,
}

/// Command-line flags, each overridable by an equivalent environment
/// variable via `clap`'s `env` feature.
#[derive(Parser, Debug)]
#[command(name = "scenevault-server", about = "Video processing pipeline server")]
struct Args {
    #[arg(long, env = "SERVER_HOST")]
    server_host: Option<String>,

    #[arg(long, env = "SERVER_PORT")]
    server_port: Option<u16>,

    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "EVENTS_TOKEN")]
    events_token: Option<String>,

    #[arg(long, env = "STORAGE_BASE_DIR")]
    storage_base_dir: Option<String>,

    #[arg(long, env = "METADATA_WORKERS")]
    metadata_workers: Option<usize>,

    #[arg(long, env = "THUMBNAIL_WORKERS")]
    thumbnail_workers: Option<usize>,

    #[arg(long, env = "SPRITES_WORKERS")]
    sprites_workers: Option<usize>,

    #[arg(long, env = "PREVIEW_WORKERS")]
    preview_workers: Option<usize>,

    #[arg(long, env = "FINGERPRINT_WORKERS")]
    fingerprint_workers: Option<usize>,

    /// `audio_only` or `dual`.
    #[arg(long, env = "FINGERPRINT_MODE")]
    fingerprint_mode: Option<String>,

    #[arg(long, env = "JOB_RETENTION_DAYS")]
    job_retention_days: Option<i64>,

    #[arg(long, env = "TRASH_RETENTION_DAYS")]
    trash_retention_days: Option<i64>,

    #[arg(long, env = "SWEEP_INTERVAL_SECS")]
    sweep_interval_secs: Option<u64>,

    #[arg(long, env = "SHUTDOWN_GRACE_SECS")]
    shutdown_grace_secs: Option<u64>,
}

impl ServerConfig {
    /// Loads `.env` (if present) then parses flags/environment, falling back
    /// to development-friendly defaults for anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let args = Args::parse();

        let mut core = CoreConfig::default();
        if let Some(workers) = args.metadata_workers {
            core.pools.metadata_workers = workers;
        }
        if let Some(workers) = args.thumbnail_workers {
            core.pools.thumbnail_workers = workers;
        }
        if let Some(workers) = args.sprites_workers {
            core.pools.sprites_workers = workers;
        }
        if let Some(workers) = args.preview_workers {
            core.pools.preview_workers = workers;
        }
        if let Some(workers) = args.fingerprint_workers {
            core.pools.fingerprint_workers = workers;
        }
        if let Some(mode) = &args.fingerprint_mode {
            core.fingerprint_mode = match mode.as_str() {
                "dual" => FingerprintMode::Dual,
                _ => FingerprintMode::AudioOnly,
            };
        }
        if let Some(days) = args.job_retention_days {
            core.retention.job_retention_days = days;
        }
        if let Some(days) = args.trash_retention_days {
            core.retention.trash_retention_days = days;
        }
        if let Some(secs) = args.sweep_interval_secs {
            core.retention.sweep_interval_secs = secs;
        }

        Ok(Self {
            server_host: args.server_host.unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: args.server_port.unwrap_or(8080),
            database_url: args
                .database_url
                .or_else(|| env::var("DATABASE_URL").ok())
                .unwrap_or_else(|| "postgres://localhost/scenevault".to_string()),
            events_token: args.events_token.unwrap_or_else(|| "dev-token".to_string()),
            storage_base_dir: args.storage_base_dir.unwrap_or_else(|| "./data".to_string()),
            shutdown_grace_secs: args.shutdown_grace_secs.unwrap_or(30),
            core,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Development-friendly defaults with no environment or CLI parsing, for
    /// tests that just need an `AppState` to exist.
    pub fn for_tests() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            database_url: "postgres://localhost/scenevault_test".to_string(),
            events_token: "test-token".to_string(),
            storage_base_dir: std::env::temp_dir().to_string_lossy().into_owned(),
            shutdown_grace_secs: 1,
            core: CoreConfig::default(),
        }
    }
}
