//! Audio normalization, tagging, and validation.
//!
//! Runs only over tracks that survived acquisition: probe the input, skip
//! re-encoding when it already meets the quality target, embed metadata
//! tags, and reject anything that fails a structural sanity check.

mod ffmpeg;

pub use ffmpeg::{probe_audio_file, tool_available, AudioMetadata};

use crate::config::AudioSettings;
use crate::track::Track;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the processing stage.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("input file not found: {0}")]
    InputMissing(PathBuf),

    #[error("ffprobe failed: {0}")]
    ProbeFailed(String),

    #[error("ffmpeg failed: {0}")]
    ConversionFailed(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Availability of the external tools the pipeline shells out to.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolStatus {
    pub ffmpeg: bool,
    pub ffprobe: bool,
}

impl ToolStatus {
    pub async fn detect() -> Self {
        Self {
            ffmpeg: tool_available("ffmpeg").await,
            ffprobe: tool_available("ffprobe").await,
        }
    }
}

/// Normalization/tagging seam the pipeline drives.
#[async_trait]
pub trait TrackProcessor: Send + Sync {
    /// Process one acquired file; returns the processed file's path.
    async fn process_track(&self, input: &Path, track: &Track)
        -> Result<PathBuf, ProcessingError>;
}

/// Normalizes and tags acquired audio files.
pub struct AudioProcessor {
    settings: AudioSettings,
    output_dir: PathBuf,
}

impl AudioProcessor {
    pub fn new(settings: AudioSettings, output_dir: PathBuf) -> Self {
        Self {
            settings,
            output_dir,
        }
    }

    /// Process one acquired file: normalize if needed, tag, validate.
    ///
    /// Returns the path of the processed file on success.
    async fn process_file(
        &self,
        input_path: &Path,
        track: &Track,
    ) -> Result<PathBuf, ProcessingError> {
        if !input_path.exists() {
            return Err(ProcessingError::InputMissing(input_path.to_path_buf()));
        }

        let output_path = self.output_path_for(track);
        let metadata_args = build_metadata_args(track);

        let probe = ffmpeg::probe_audio_file(input_path).await?;
        let meets_target = probe.format.contains("mp3")
            && probe
                .bitrate
                .map(|b| b >= self.settings.target_bitrate_kbps as i32)
                .unwrap_or(false);

        if meets_target {
            debug!(
                input = %input_path.display(),
                bitrate = ?probe.bitrate,
                "input already at target quality, remuxing tags only"
            );
            ffmpeg::remux_with_tags(input_path, &output_path, &metadata_args).await?;
        } else {
            ffmpeg::convert_to_mp3(
                input_path,
                &output_path,
                self.settings.target_bitrate_kbps,
                self.settings.target_sample_rate_hz,
                &metadata_args,
            )
            .await?;
        }

        self.validate(&output_path).await?;

        info!(track = %track.display_name(), output = %output_path.display(), "processed");
        Ok(output_path)
    }

    /// Structural sanity check on a processed file.
    pub async fn validate(&self, path: &Path) -> Result<(), ProcessingError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| ProcessingError::ValidationFailed("output file missing".to_string()))?;

        if metadata.len() < self.settings.min_file_bytes {
            return Err(ProcessingError::ValidationFailed(format!(
                "file is only {} bytes",
                metadata.len()
            )));
        }

        let probe = ffmpeg::probe_audio_file(path).await?;
        let min_ms = self.settings.min_duration_secs as i64 * 1000;
        if probe.duration_ms < min_ms {
            return Err(ProcessingError::ValidationFailed(format!(
                "duration {}ms below the {}s sanity threshold",
                probe.duration_ms, self.settings.min_duration_secs
            )));
        }

        Ok(())
    }

    fn output_path_for(&self, track: &Track) -> PathBuf {
        self.output_dir
            .join(crate::acquisition::track_filename(track))
    }
}

#[async_trait]
impl TrackProcessor for AudioProcessor {
    async fn process_track(
        &self,
        input: &Path,
        track: &Track,
    ) -> Result<PathBuf, ProcessingError> {
        self.process_file(input, track).await
    }
}

/// ffmpeg `-metadata` arguments for a track's tag set.
fn build_metadata_args(track: &Track) -> Vec<String> {
    let mut args = Vec::new();
    let mut push = |key: &str, value: &str| {
        args.push("-metadata".to_string());
        args.push(format!("{}={}", key, value));
    };

    push("title", &track.title);
    push("artist", &track.artist);
    // Label doubles as the album tag; DJ hardware groups by album.
    if let Some(label) = &track.label {
        push("album", label);
    }
    if let Some(genre) = &track.genre {
        push("genre", genre);
    }
    if let Some(bpm) = track.bpm {
        push("TBPM", &bpm.to_string());
    }
    if let Some(key) = &track.key {
        push("TKEY", key);
    }
    if let Some(date) = &track.release_date {
        push("date", date);
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackSource;
    use tempfile::TempDir;

    fn make_track() -> Track {
        let mut t = Track::new("INJI", "GASLIGHT", TrackSource::StorefrontApi)
            .with_bpm(126)
            .with_genre("Tech House")
            .with_label("TH3RD BRAIN");
        t.key = Some("F maj".to_string());
        t.release_date = Some("2025-06-20".to_string());
        t
    }

    #[test]
    fn test_build_metadata_args_full() {
        let args = build_metadata_args(&make_track());
        let joined = args.join(" ");

        assert!(joined.contains("title=GASLIGHT"));
        assert!(joined.contains("artist=INJI"));
        assert!(joined.contains("album=TH3RD BRAIN"));
        assert!(joined.contains("genre=Tech House"));
        assert!(joined.contains("TBPM=126"));
        assert!(joined.contains("TKEY=F maj"));
        assert!(joined.contains("date=2025-06-20"));
    }

    #[test]
    fn test_build_metadata_args_skips_missing_fields() {
        let track = Track::new("a", "t", TrackSource::Scout);
        let args = build_metadata_args(&track);
        let joined = args.join(" ");

        assert!(joined.contains("title=t"));
        assert!(!joined.contains("album="));
        assert!(!joined.contains("TBPM="));
    }

    #[tokio::test]
    async fn test_process_track_missing_input() {
        let dir = TempDir::new().unwrap();
        let processor =
            AudioProcessor::new(AudioSettings::default(), dir.path().join("processed"));

        let err = processor
            .process_track(&dir.path().join("missing.mp3"), &make_track())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::InputMissing(_)));
    }

    #[tokio::test]
    async fn test_validate_rejects_missing_and_tiny_files() {
        let dir = TempDir::new().unwrap();
        let processor =
            AudioProcessor::new(AudioSettings::default(), dir.path().join("processed"));

        let err = processor.validate(&dir.path().join("nope.mp3")).await;
        assert!(matches!(err, Err(ProcessingError::ValidationFailed(_))));

        let tiny = dir.path().join("tiny.mp3");
        std::fs::write(&tiny, b"short").unwrap();
        let err = processor.validate(&tiny).await;
        assert!(matches!(err, Err(ProcessingError::ValidationFailed(_))));
    }

    #[test]
    fn test_output_path_uses_sanitized_track_name() {
        let processor = AudioProcessor::new(
            AudioSettings::default(),
            PathBuf::from("/tmp/processed"),
        );
        let path = processor.output_path_for(&make_track());
        assert_eq!(path, PathBuf::from("/tmp/processed/INJI - GASLIGHT.mp3"));
    }
}
