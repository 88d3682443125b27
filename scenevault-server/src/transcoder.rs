//! Process-backed [`Transcoder`] adapter: the concrete transcoding
//! collaborator the core treats as external and opaque. The core only ever
//! sees the trait; this module is the one place that actually shells out to
//! `ffmpeg`/`ffprobe` (process spawn, stderr capture, cancellation race; JSON
//! parsing of ffprobe output via `serde_json::Value`).

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use scenevault_core::{CoreError, CoreResult, FingerprintSample, ProbeOutput, SpriteOutput, SpriteTile, Transcoder};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Sprite sheet layout: a fixed grid of tiles, one every `INTERVAL_SECS` of
/// the timeline.
const SPRITE_COLUMNS: u32 = 10;
const SPRITE_TILE_WIDTH: u32 = 160;
const SPRITE_TILE_HEIGHT: u32 = 90;
const SPRITE_INTERVAL_SECS: f64 = 10.0;

/// Audio fingerprint sample rate: roughly 8 hash positions per second.
const AUDIO_FINGERPRINT_HZ: f64 = 8.0;
/// Visual fingerprint sample rate: one frame hash every this-many seconds.
const VISUAL_FINGERPRINT_INTERVAL_SECS: f64 = 1.0;

#[derive(Clone, Debug)]
pub struct FfmpegPaths {
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for FfmpegPaths {
    fn default() -> Self {
        Self { ffmpeg: "ffmpeg".to_string(), ffprobe: "ffprobe".to_string() }
    }
}

pub struct ProcessTranscoder {
    paths: FfmpegPaths,
}

impl ProcessTranscoder {
    pub fn new(paths: FfmpegPaths) -> Self {
        Self { paths }
    }

    /// Runs a child process to completion, racing it against `cancel`. On
    /// cancellation the child is killed and `CoreError::Cancelled` is
    /// returned so the scheduler's checkpoint logic observes it the same
    /// way it would any other cancellable operation.
    async fn run(&self, mut command: Command, operation: &str, cancel: CancellationToken) -> CoreResult<Vec<u8>> {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = command.spawn().map_err(CoreError::Io)?;

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                Err(CoreError::Cancelled(format!("{operation} cancelled")))
            }
            output = child.wait_with_output() => {
                let output = output.map_err(CoreError::Io)?;
                if !output.status.success() {
                    let stderr_excerpt: String = String::from_utf8_lossy(&output.stderr).chars().take(4096).collect();
                    return Err(CoreError::TranscodeFailed { operation: operation.to_string(), stderr_excerpt });
                }
                Ok(output.stdout)
            }
        }
    }

    fn ensure_parent_dir(path: &str) -> CoreResult<()> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent).map_err(CoreError::Io)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Transcoder for ProcessTranscoder {
    async fn probe(&self, source_path: &str, cancel: CancellationToken) -> CoreResult<ProbeOutput> {
        let mut command = Command::new(&self.paths.ffprobe);
        command.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            source_path,
        ]);

        let stdout = self.run(command, "probe", cancel).await?;
        let json: serde_json::Value = serde_json::from_slice(&stdout)
            .map_err(|e| CoreError::TranscodeFailed { operation: "probe".to_string(), stderr_excerpt: e.to_string() })?;

        let duration_secs = json["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        let streams = json["streams"].as_array().cloned().unwrap_or_default();
        let video_stream = streams.iter().find(|s| s["codec_type"] == "video");
        let audio_stream = streams.iter().find(|s| s["codec_type"] == "audio");

        let width = video_stream.and_then(|s| s["width"].as_i64()).unwrap_or(0) as i32;
        let height = video_stream.and_then(|s| s["height"].as_i64()).unwrap_or(0) as i32;
        let video_codec = video_stream
            .and_then(|s| s["codec_name"].as_str())
            .unwrap_or("unknown")
            .to_string();
        let frame_rate = video_stream
            .and_then(|s| s["r_frame_rate"].as_str())
            .and_then(parse_rational_rate)
            .unwrap_or(0.0);
        let audio_codec = audio_stream.and_then(|s| s["codec_name"].as_str()).map(str::to_string);

        Ok(ProbeOutput { duration_secs, width, height, frame_rate, video_codec, audio_codec })
    }

    async fn extract_thumbnail(
        &self,
        source_path: &str,
        output_path: &str,
        duration_secs: f64,
        cancel: CancellationToken,
    ) -> CoreResult<()> {
        Self::ensure_parent_dir(output_path)?;
        let seek = (duration_secs / 2.0).max(0.0);
        let mut command = Command::new(&self.paths.ffmpeg);
        command.args([
            "-y",
            "-ss",
            &seek.to_string(),
            "-i",
            source_path,
            "-frames:v",
            "1",
            "-q:v",
            "2",
            output_path,
        ]);
        self.run(command, "extract_thumbnail", cancel).await?;
        Ok(())
    }

    async fn generate_sprites(
        &self,
        source_path: &str,
        sheet_path: &str,
        duration_secs: f64,
        cancel: CancellationToken,
    ) -> CoreResult<SpriteOutput> {
        Self::ensure_parent_dir(sheet_path)?;
        let tiles = sprite_tiles(duration_secs);
        let rows = tiles.len().div_ceil(SPRITE_COLUMNS as usize).max(1);

        let mut command = Command::new(&self.paths.ffmpeg);
        command.args([
            "-y",
            "-i",
            source_path,
            "-vf",
            &format!(
                "fps=1/{SPRITE_INTERVAL_SECS},scale={SPRITE_TILE_WIDTH}:{SPRITE_TILE_HEIGHT},tile={SPRITE_COLUMNS}x{rows}"
            ),
            "-frames:v",
            "1",
            sheet_path,
        ]);
        self.run(command, "generate_sprites", cancel).await?;

        Ok(SpriteOutput { sheet_path: sheet_path.to_string(), tiles })
    }

    async fn render_preview(
        &self,
        source_path: &str,
        output_path: &str,
        duration_secs: f64,
        cancel: CancellationToken,
    ) -> CoreResult<()> {
        Self::ensure_parent_dir(output_path)?;
        let start = (duration_secs * 0.1).max(0.0);
        let mut command = Command::new(&self.paths.ffmpeg);
        command.args([
            "-y",
            "-ss",
            &start.to_string(),
            "-i",
            source_path,
            "-t",
            "15",
            "-c:v",
            "libx264",
            "-c:a",
            "aac",
            output_path,
        ]);
        self.run(command, "render_preview", cancel).await?;
        Ok(())
    }

    async fn compute_audio_fingerprint(&self, source_path: &str, cancel: CancellationToken) -> CoreResult<Vec<FingerprintSample>> {
        let mut command = Command::new(&self.paths.ffmpeg);
        command.args([
            "-v",
            "quiet",
            "-i",
            source_path,
            "-ac",
            "1",
            "-ar",
            "8000",
            "-f",
            "s16le",
            "-",
        ]);
        let pcm = self.run(command, "compute_audio_fingerprint", cancel).await?;

        let samples_per_position = (8000.0 / AUDIO_FINGERPRINT_HZ) as usize * 2; // i16 bytes
        if samples_per_position == 0 {
            return Ok(Vec::new());
        }
        let mut result = Vec::new();
        for (position, chunk) in pcm.chunks(samples_per_position).enumerate() {
            if chunk.len() < 2 {
                continue;
            }
            result.push(FingerprintSample { position: position as u32, hash: constellation_hash(chunk) });
        }
        Ok(result)
    }

    async fn compute_visual_fingerprint(&self, source_path: &str, cancel: CancellationToken) -> CoreResult<Vec<FingerprintSample>> {
        let mut command = Command::new(&self.paths.ffmpeg);
        command.args([
            "-v",
            "quiet",
            "-i",
            source_path,
            "-vf",
            &format!("fps=1/{VISUAL_FINGERPRINT_INTERVAL_SECS},scale=9:8,format=gray"),
            "-f",
            "rawvideo",
            "-",
        ]);
        let frames_raw = self.run(command, "compute_visual_fingerprint", cancel).await?;

        const FRAME_BYTES: usize = 9 * 8;
        if frames_raw.is_empty() {
            return Ok(Vec::new());
        }
        let mut result = Vec::new();
        for (position, frame) in frames_raw.chunks(FRAME_BYTES).enumerate() {
            if frame.len() < FRAME_BYTES {
                break;
            }
            result.push(FingerprintSample { position: position as u32, hash: difference_hash(frame) });
        }
        Ok(result)
    }
}

fn parse_rational_rate(raw: &str) -> Option<f64> {
    let (num, denom) = raw.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let denom: f64 = denom.parse().ok()?;
    if denom == 0.0 {
        None
    } else {
        Some(num / denom)
    }
}

/// Every sprite tile position for a timeline of `duration_secs`, laid out
/// left-to-right, top-to-bottom across `SPRITE_COLUMNS` columns — computed
/// analytically rather than parsed back out of ffmpeg's `tile` filter
/// output, since the layout is deterministic from the inputs we chose.
fn sprite_tiles(duration_secs: f64) -> Vec<SpriteTile> {
    if duration_secs <= 0.0 {
        return Vec::new();
    }
    let count = (duration_secs / SPRITE_INTERVAL_SECS).ceil().max(1.0) as usize;
    (0..count)
        .map(|index| {
            let start_secs = index as f64 * SPRITE_INTERVAL_SECS;
            let end_secs = (start_secs + SPRITE_INTERVAL_SECS).min(duration_secs);
            let column = (index as u32) % SPRITE_COLUMNS;
            let row = (index as u32) / SPRITE_COLUMNS;
            SpriteTile {
                start_secs,
                end_secs,
                x: column * SPRITE_TILE_WIDTH,
                y: row * SPRITE_TILE_HEIGHT,
                width: SPRITE_TILE_WIDTH,
                height: SPRITE_TILE_HEIGHT,
            }
        })
        .collect()
}

/// A simple constellation-style hash over a chunk of 16-bit PCM samples:
/// folds amplitude peaks into a 32-bit hash, then widens to the fixed-width
/// `u64` column the fingerprint table shares between both kinds.
fn constellation_hash(chunk: &[u8]) -> u64 {
    let mut hash: u32 = 2166136261; // FNV-1a offset basis
    for pair in chunk.chunks(2) {
        if pair.len() < 2 {
            continue;
        }
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        hash ^= sample as u16 as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash as u64
}

/// 64-bit perceptual difference-hash over an 9x8 grayscale frame: compares
/// each pixel to its right neighbour, matching the classic dHash used by
/// real-world near-duplicate detectors.
fn difference_hash(frame: &[u8]) -> u64 {
    let mut hash: u64 = 0;
    let mut bit = 0u32;
    for row in 0..8usize {
        for col in 0..8usize {
            let left = frame[row * 9 + col];
            let right = frame[row * 9 + col + 1];
            if left > right {
                hash |= 1 << bit;
            }
            bit += 1;
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_tiles_covers_the_full_duration() {
        let tiles = sprite_tiles(95.0);
        assert_eq!(tiles.len(), 10);
        assert_eq!(tiles.last().unwrap().end_secs, 95.0);
        assert_eq!(tiles[0].x, 0);
        assert_eq!(tiles[0].y, 0);
    }

    #[test]
    fn difference_hash_is_deterministic() {
        let frame = vec![128u8; 9 * 8];
        assert_eq!(difference_hash(&frame), 0);
        let mut gradient = vec![0u8; 9 * 8];
        for (i, b) in gradient.iter_mut().enumerate() {
            *b = (i % 9 * 20) as u8;
        }
        let hash_a = difference_hash(&gradient);
        let hash_b = difference_hash(&gradient);
        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn parses_rational_frame_rate() {
        assert_eq!(parse_rational_rate("30000/1001"), Some(30000.0 / 1001.0));
        assert_eq!(parse_rational_rate("bogus"), None);
    }
}
