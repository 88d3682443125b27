use serde::{Deserialize, Serialize};

use crate::ids::SceneId;

/// Audio fingerprints are 32-bit constellation hashes; visual fingerprints
/// are 64-bit perceptual frame hashes. Stored as `u64` uniformly so both
/// kinds share one table/row shape; the unused high bits for audio rows are
/// always zero.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintKind {
    Audio,
    Visual,
}

/// One row in the fingerprint corpus: `(scene_id, type, position) -> hash`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRow {
    pub scene_id: SceneId,
    pub kind: FingerprintKind,
    /// Audio: ~8 positions/second. Visual: frame index.
    pub position: u32,
    pub hash: u64,
}
