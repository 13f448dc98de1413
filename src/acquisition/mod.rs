//! Audio acquisition.
//!
//! Tries sources in priority order per track (direct storefront URL first,
//! then the media ripper), reusing cached files and pacing each collaborator
//! independently. One track failing every source degrades the batch by one;
//! it never aborts it.

pub mod direct;
pub mod ripper;

pub use direct::DirectUrlSource;
pub use ripper::MediaRipperSource;

use crate::track::Track;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

/// File extensions counted as audio in cache statistics.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "ogg"];

/// Errors from the acquisition stage.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("no source offered a download for this track")]
    NoSourceAvailable,

    #[error("all sources failed: {0}")]
    AllSourcesFailed(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("ripper failed: {0}")]
    Ripper(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One way of obtaining audio for a track.
///
/// `Ok(false)` means the source has nothing to offer for this track (not an
/// error); `Err` means it tried and failed. On `Ok(true)` the audio file is
/// at `dest`.
#[async_trait]
pub trait AcquisitionSource: Send + Sync {
    fn label(&self) -> &'static str;

    async fn acquire(&self, track: &Track, dest: &Path) -> Result<bool, AcquisitionError>;
}

/// Download-cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_bytes: u64,
}

/// Coordinates acquisition sources and the download cache.
pub struct AcquisitionManager {
    sources: Vec<Arc<dyn AcquisitionSource>>,
    cache_dir: PathBuf,
}

impl AcquisitionManager {
    /// Create the manager; failing to create the cache directory is an
    /// infrastructure error and fatal to the caller.
    pub fn new(
        sources: Vec<Arc<dyn AcquisitionSource>>,
        cache_dir: PathBuf,
    ) -> Result<Self, AcquisitionError> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { sources, cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Acquire audio for one track, trying sources in priority order and
    /// stopping at the first success.
    pub async fn acquire(&self, track: &Track) -> Result<PathBuf, AcquisitionError> {
        let filename = track_filename(track);
        let dest = self.cache_dir.join(&filename);

        if dest.exists() {
            info!(file = %filename, "already cached");
            return Ok(dest);
        }

        let mut attempts: Vec<String> = Vec::new();

        for source in &self.sources {
            match source.acquire(track, &dest).await {
                Ok(true) => {
                    info!(source = source.label(), file = %filename, "acquired");
                    return Ok(dest);
                }
                Ok(false) => continue,
                Err(e) => {
                    warn!(
                        source = source.label(),
                        track = %track.display_name(),
                        error = %e,
                        "acquisition source failed"
                    );
                    attempts.push(format!("{}: {}", source.label(), e));
                }
            }
        }

        if attempts.is_empty() {
            Err(AcquisitionError::NoSourceAvailable)
        } else {
            Err(AcquisitionError::AllSourcesFailed(attempts.join("; ")))
        }
    }

    /// Count audio files and bytes in the cache.
    pub fn cache_stats(&self) -> CacheStats {
        dir_audio_stats(&self.cache_dir)
    }

    /// Remove every cached download, leaving an empty cache directory.
    pub async fn clear_cache(&self) -> Result<(), AcquisitionError> {
        if self.cache_dir.exists() {
            tokio::fs::remove_dir_all(&self.cache_dir).await?;
        }
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        Ok(())
    }
}

/// Audio file count and total size under a directory tree.
pub fn dir_audio_stats(dir: &Path) -> CacheStats {
    let mut stats = CacheStats::default();
    if !dir.exists() {
        return stats;
    }

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_audio = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if !is_audio {
            continue;
        }
        stats.total_files += 1;
        stats.total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
    }

    stats
}

/// Sanitize a name for filesystem use: strip reserved characters, collapse
/// whitespace, cap the length.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(50).collect::<String>().trim().to_string()
}

/// Deterministic cache filename for a track.
pub fn track_filename(track: &Track) -> String {
    format!(
        "{} - {}.mp3",
        sanitize_name(&track.artist),
        sanitize_name(&track.title)
    )
}

/// Resolve a filename collision inside `dir` by appending " (n)".
pub fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let ext = Path::new(filename)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let mut counter = 1;
    loop {
        let next = if ext.is_empty() {
            dir.join(format!("{} ({})", stem, counter))
        } else {
            dir.join(format!("{} ({}).{}", stem, counter, ext))
        };
        if !next.exists() {
            return next;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackSource;
    use tempfile::TempDir;

    struct NeverSource;

    #[async_trait]
    impl AcquisitionSource for NeverSource {
        fn label(&self) -> &'static str {
            "never"
        }
        async fn acquire(&self, _track: &Track, _dest: &Path) -> Result<bool, AcquisitionError> {
            Ok(false)
        }
    }

    struct FailingSource;

    #[async_trait]
    impl AcquisitionSource for FailingSource {
        fn label(&self) -> &'static str {
            "failing"
        }
        async fn acquire(&self, _track: &Track, _dest: &Path) -> Result<bool, AcquisitionError> {
            Err(AcquisitionError::Download("connection reset".to_string()))
        }
    }

    struct WritingSource;

    #[async_trait]
    impl AcquisitionSource for WritingSource {
        fn label(&self) -> &'static str {
            "writing"
        }
        async fn acquire(&self, _track: &Track, dest: &Path) -> Result<bool, AcquisitionError> {
            tokio::fs::write(dest, b"audio").await?;
            Ok(true)
        }
    }

    fn make_track() -> Track {
        Track::new("Justin Jay", "Weekend", TrackSource::StorefrontApi)
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("A/B: C?"), "A_B_ C_");
        assert_eq!(sanitize_name("  spaced   out  "), "spaced out");

        let long = "x".repeat(80);
        assert_eq!(sanitize_name(&long).len(), 50);
    }

    #[test]
    fn test_track_filename() {
        let track = Track::new("AC/DC", "Back: Again", TrackSource::Library);
        assert_eq!(track_filename(&track), "AC_DC - Back_ Again.mp3");
    }

    #[test]
    fn test_unique_path_resolves_collisions() {
        let dir = TempDir::new().unwrap();
        let first = unique_path(dir.path(), "song.mp3");
        assert_eq!(first, dir.path().join("song.mp3"));

        std::fs::write(&first, b"x").unwrap();
        let second = unique_path(dir.path(), "song.mp3");
        assert_eq!(second, dir.path().join("song (1).mp3"));

        std::fs::write(&second, b"x").unwrap();
        let third = unique_path(dir.path(), "song.mp3");
        assert_eq!(third, dir.path().join("song (2).mp3"));
    }

    #[tokio::test]
    async fn test_acquire_uses_first_successful_source() {
        let dir = TempDir::new().unwrap();
        let manager = AcquisitionManager::new(
            vec![Arc::new(NeverSource), Arc::new(WritingSource)],
            dir.path().join("cache"),
        )
        .unwrap();

        let path = manager.acquire(&make_track()).await.unwrap();
        assert!(path.exists());
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "Justin Jay - Weekend.mp3"
        );
    }

    #[tokio::test]
    async fn test_acquire_cache_hit_skips_sources() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("cache");
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(cache.join("Justin Jay - Weekend.mp3"), b"cached").unwrap();

        // Only a failing source: a cache hit must still succeed.
        let manager =
            AcquisitionManager::new(vec![Arc::new(FailingSource)], cache.clone()).unwrap();

        let path = manager.acquire(&make_track()).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_acquire_reports_all_failures() {
        let dir = TempDir::new().unwrap();
        let manager = AcquisitionManager::new(
            vec![Arc::new(FailingSource)],
            dir.path().join("cache"),
        )
        .unwrap();

        let err = manager.acquire(&make_track()).await.unwrap_err();
        match err {
            AcquisitionError::AllSourcesFailed(msg) => {
                assert!(msg.contains("failing"));
                assert!(msg.contains("connection reset"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_acquire_no_source_available() {
        let dir = TempDir::new().unwrap();
        let manager =
            AcquisitionManager::new(vec![Arc::new(NeverSource)], dir.path().join("cache"))
                .unwrap();

        let err = manager.acquire(&make_track()).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::NoSourceAvailable));
    }

    #[tokio::test]
    async fn test_cache_stats_and_clear() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("cache");
        let manager = AcquisitionManager::new(vec![], cache.clone()).unwrap();

        std::fs::write(cache.join("a.mp3"), vec![0u8; 100]).unwrap();
        std::fs::write(cache.join("b.flac"), vec![0u8; 50]).unwrap();
        std::fs::write(cache.join("notes.txt"), b"not audio").unwrap();

        let stats = manager.cache_stats();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_bytes, 150);

        manager.clear_cache().await.unwrap();
        assert_eq!(manager.cache_stats(), CacheStats::default());
        assert!(cache.exists());
    }
}
