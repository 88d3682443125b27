use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::CoreResult;

/// Output of the `probe` operation — the metadata phase's input.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeOutput {
    pub duration_secs: f64,
    pub width: i32,
    pub height: i32,
    pub frame_rate: f64,
    pub video_codec: String,
    /// `None` means the source has no audio stream.
    pub audio_codec: Option<String>,
}

/// One rendered sprite tile plus the time range it covers on the timeline,
/// the unit the cue-file writer (`crate::vtt`) consumes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpriteTile {
    pub start_secs: f64,
    pub end_secs: f64,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpriteOutput {
    pub sheet_path: String,
    pub tiles: Vec<SpriteTile>,
}

/// One raw fingerprint sample prior to being attached to a scene id — the
/// store layer stamps `scene_id` on when persisting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FingerprintSample {
    pub position: u32,
    pub hash: u64,
}

/// Opaque boundary to the media-decoding primitives this system never
/// implements itself: every operation takes an input path and produces an
/// output path plus structured metadata. Every operation accepts a
/// `CancellationToken` so a worker can abort mid-transcode at the
/// operation's next checkpoint.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn probe(&self, source_path: &str, cancel: CancellationToken) -> CoreResult<ProbeOutput>;

    async fn extract_thumbnail(
        &self,
        source_path: &str,
        output_path: &str,
        duration_secs: f64,
        cancel: CancellationToken,
    ) -> CoreResult<()>;

    async fn generate_sprites(
        &self,
        source_path: &str,
        sheet_path: &str,
        duration_secs: f64,
        cancel: CancellationToken,
    ) -> CoreResult<SpriteOutput>;

    async fn render_preview(
        &self,
        source_path: &str,
        output_path: &str,
        duration_secs: f64,
        cancel: CancellationToken,
    ) -> CoreResult<()>;

    async fn compute_audio_fingerprint(
        &self,
        source_path: &str,
        cancel: CancellationToken,
    ) -> CoreResult<Vec<FingerprintSample>>;

    async fn compute_visual_fingerprint(
        &self,
        source_path: &str,
        cancel: CancellationToken,
    ) -> CoreResult<Vec<FingerprintSample>>;
}
