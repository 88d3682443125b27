use serde::{Deserialize, Serialize};

/// Global knobs tuning the scheduler, detector and ledger. All fields carry
/// defaults so a caller can override only what it needs.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    pub pools: PoolConfig,
    pub fingerprint_mode: FingerprintMode,
    pub detector: DetectorConfig,
    pub retention: RetentionConfig,
}

/// Worker counts per phase.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub metadata_workers: usize,
    pub thumbnail_workers: usize,
    pub sprites_workers: usize,
    pub preview_workers: usize,
    pub fingerprint_workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            metadata_workers: 4,
            thumbnail_workers: 2,
            sprites_workers: 2,
            preview_workers: 2,
            fingerprint_workers: 2,
        }
    }
}

/// Fingerprint phase mode policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMode {
    AudioOnly,
    Dual,
}

impl Default for FingerprintMode {
    fn default() -> Self {
        FingerprintMode::AudioOnly
    }
}

/// Duplicate-detector thresholds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub max_hash_occurrences: usize,
    pub min_hashes: usize,
    pub delta_tolerance: i64,

    pub audio_min_hashes: usize,
    pub audio_min_span: i64,
    pub audio_density_threshold: f64,

    pub visual_hamming_max: u32,
    pub visual_min_frames: usize,
    pub visual_min_span: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_hash_occurrences: 50,
            min_hashes: 4,
            delta_tolerance: 2,
            audio_min_hashes: 10,
            audio_min_span: 40,
            audio_density_threshold: 0.5,
            visual_hamming_max: 8,
            visual_min_frames: 6,
            visual_min_span: 12,
        }
    }
}

/// Job Ledger / trash retention windows.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub job_retention_days: i64,
    pub trash_retention_days: i64,
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            job_retention_days: 7,
            trash_retention_days: 7,
            sweep_interval_secs: 3600,
        }
    }
}
