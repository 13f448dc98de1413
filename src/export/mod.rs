//! USB export bundle.
//!
//! Stages processed audio into the Pioneer folder layout, writes the
//! Rekordbox XML manifest plus the M3U and track-list companions, and
//! validates the manifest structurally before reporting success.

mod m3u;
mod rekordbox;

pub use rekordbox::ManifestValidation;

use crate::acquisition::{dir_audio_stats, unique_path, CacheStats};
use crate::track::Track;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A processed track together with its staged file location.
#[derive(Debug, Clone)]
pub struct StagedTrack {
    pub track: Track,
    pub path: PathBuf,
}

/// Where everything landed after a successful export.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub playlist_name: String,
    pub track_count: usize,
    pub usb_path: PathBuf,
    pub xml_path: PathBuf,
    pub m3u_path: PathBuf,
    pub track_list_path: PathBuf,
    pub validation: ManifestValidation,
    /// Tracks that made it into the manifest, with staged locations.
    pub staged: Vec<StagedTrack>,
}

/// Writes the USB bundle for Pioneer hardware.
pub struct UsbExporter {
    usb_dir: PathBuf,
}

impl UsbExporter {
    pub fn new(usb_dir: PathBuf) -> Self {
        Self { usb_dir }
    }

    pub fn usb_dir(&self) -> &Path {
        &self.usb_dir
    }

    fn music_dir(&self) -> PathBuf {
        self.usb_dir.join("Music")
    }

    fn manifest_path(&self) -> PathBuf {
        self.usb_dir.join("PIONEER").join("rekordbox").join("rekordbox.xml")
    }

    /// Build the export bundle from processed tracks.
    ///
    /// Directory creation failures are infrastructure errors and abort the
    /// export; a single file failing to stage only drops that track from
    /// the manifest.
    pub async fn export(
        &self,
        tracks_with_paths: &[(Track, PathBuf)],
        playlist_name: &str,
    ) -> Result<ExportSummary> {
        let music_dir = self.music_dir();
        let rekordbox_dir = self.usb_dir.join("PIONEER").join("rekordbox");
        let playlists_dir = self.usb_dir.join("Playlists");
        for dir in [&music_dir, &rekordbox_dir, &playlists_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create export directory {:?}", dir))?;
        }

        // Stage audio into Music/, resolving name collisions with suffixes.
        let mut staged: Vec<StagedTrack> = Vec::new();
        for (track, processed_path) in tracks_with_paths {
            let filename = processed_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("track.mp3");
            let dest = unique_path(&music_dir, filename);

            match tokio::fs::copy(processed_path, &dest).await {
                Ok(_) => {
                    info!(file = %dest.display(), "staged to USB");
                    staged.push(StagedTrack {
                        track: track.clone(),
                        path: dest,
                    });
                }
                Err(e) => {
                    warn!(
                        track = %track.display_name(),
                        error = %e,
                        "failed to stage file, leaving it out of the manifest"
                    );
                }
            }
        }

        let xml = rekordbox::generate_xml(&staged, playlist_name);
        let xml_path = self.manifest_path();
        tokio::fs::write(&xml_path, &xml)
            .await
            .with_context(|| format!("Failed to write manifest {:?}", xml_path))?;

        let m3u_path = playlists_dir.join(format!("{}.m3u", playlist_name));
        tokio::fs::write(&m3u_path, m3u::generate_m3u(&staged, playlist_name))
            .await
            .context("Failed to write M3U playlist")?;

        let track_list_path = self
            .usb_dir
            .join(format!("{}_track_list.txt", playlist_name));
        tokio::fs::write(
            &track_list_path,
            m3u::generate_track_list(&staged, playlist_name),
        )
        .await
        .context("Failed to write track list")?;

        let validation = rekordbox::validate_xml_content(&xml);
        if !validation.valid {
            warn!(errors = ?validation.errors, "manifest failed structural validation");
        }

        Ok(ExportSummary {
            playlist_name: playlist_name.to_string(),
            track_count: staged.len(),
            usb_path: self.usb_dir.clone(),
            xml_path,
            m3u_path,
            track_list_path,
            validation,
            staged,
        })
    }

    /// Re-validate the manifest currently on disk.
    pub async fn validate_manifest(&self) -> Result<ManifestValidation> {
        let path = self.manifest_path();
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read manifest {:?}", path))?;
        Ok(rekordbox::validate_xml_content(&content))
    }

    /// Audio file statistics for the staged bundle.
    pub fn stats(&self) -> CacheStats {
        dir_audio_stats(&self.usb_dir)
    }

    /// Remove the whole bundle, leaving an empty export directory.
    pub async fn clear(&self) -> Result<()> {
        if self.usb_dir.exists() {
            tokio::fs::remove_dir_all(&self.usb_dir)
                .await
                .context("Failed to clear export bundle")?;
        }
        tokio::fs::create_dir_all(&self.usb_dir)
            .await
            .context("Failed to recreate export directory")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackSource;
    use tempfile::TempDir;

    fn make_processed(dir: &Path, artist: &str, title: &str) -> (Track, PathBuf) {
        let track = Track::new(artist, title, TrackSource::StorefrontApi).with_bpm(124);
        let path = dir.join(format!("{} - {}.mp3", artist, title));
        std::fs::write(&path, b"processed audio").unwrap();
        (track, path)
    }

    #[tokio::test]
    async fn test_export_builds_full_bundle() {
        let dir = TempDir::new().unwrap();
        let processed_dir = dir.path().join("processed");
        std::fs::create_dir_all(&processed_dir).unwrap();

        let tracks = vec![
            make_processed(&processed_dir, "A", "One"),
            make_processed(&processed_dir, "B", "Two"),
        ];

        let exporter = UsbExporter::new(dir.path().join("usb"));
        let summary = exporter.export(&tracks, "Test Set").await.unwrap();

        assert_eq!(summary.track_count, 2);
        assert!(summary.validation.valid);
        assert!(summary.xml_path.exists());
        assert!(summary.m3u_path.exists());
        assert!(summary.track_list_path.exists());
        assert!(dir.path().join("usb/Music/A - One.mp3").exists());
        assert!(dir.path().join("usb/Music/B - Two.mp3").exists());
    }

    #[tokio::test]
    async fn test_export_manifest_references_only_staged_tracks() {
        let dir = TempDir::new().unwrap();
        let processed_dir = dir.path().join("processed");
        std::fs::create_dir_all(&processed_dir).unwrap();

        let good = make_processed(&processed_dir, "Good", "Track");
        // This file does not exist, so staging it must fail quietly.
        let missing = (
            Track::new("Gone", "Missing", TrackSource::Scout),
            processed_dir.join("nope.mp3"),
        );

        let exporter = UsbExporter::new(dir.path().join("usb"));
        let summary = exporter.export(&[good, missing], "Set").await.unwrap();

        assert_eq!(summary.track_count, 1);
        let xml = std::fs::read_to_string(&summary.xml_path).unwrap();
        assert!(xml.contains("Good"));
        assert!(!xml.contains("Missing"));
    }

    #[tokio::test]
    async fn test_validate_manifest_roundtrip() {
        let dir = TempDir::new().unwrap();
        let processed_dir = dir.path().join("processed");
        std::fs::create_dir_all(&processed_dir).unwrap();
        let tracks = vec![make_processed(&processed_dir, "A", "One")];

        let exporter = UsbExporter::new(dir.path().join("usb"));
        exporter.export(&tracks, "Set").await.unwrap();

        let validation = exporter.validate_manifest().await.unwrap();
        assert!(validation.valid);
        assert_eq!(validation.track_count, 1);
    }

    #[tokio::test]
    async fn test_validate_manifest_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let exporter = UsbExporter::new(dir.path().join("usb"));
        assert!(exporter.validate_manifest().await.is_err());
    }

    #[tokio::test]
    async fn test_clear_resets_bundle() {
        let dir = TempDir::new().unwrap();
        let processed_dir = dir.path().join("processed");
        std::fs::create_dir_all(&processed_dir).unwrap();
        let tracks = vec![make_processed(&processed_dir, "A", "One")];

        let exporter = UsbExporter::new(dir.path().join("usb"));
        exporter.export(&tracks, "Set").await.unwrap();
        assert_eq!(exporter.stats().total_files, 1);

        exporter.clear().await.unwrap();
        assert_eq!(exporter.stats().total_files, 0);
        assert!(exporter.usb_dir().exists());
    }
}
