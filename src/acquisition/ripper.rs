//! Media ripper acquisition source.
//!
//! Best-effort fallback that shells out to yt-dlp: rips a track's media page
//! directly when discovery supplied one, otherwise runs a search-and-grab
//! against streaming platforms. Strictly lower priority than the direct
//! source.

use super::{sanitize_name, AcquisitionError, AcquisitionSource};
use crate::pacing::Pacer;
use crate::track::Track;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

pub struct MediaRipperSource {
    bin: String,
    pacer: Pacer,
}

impl MediaRipperSource {
    pub fn new(bin: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            bin: bin.into(),
            pacer: Pacer::from_millis(interval_ms),
        }
    }

    /// Check whether the ripper binary runs at all.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.bin)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Rip a single explicit URL into `cache_dir`, named "Artist - Title.mp3".
    pub async fn rip_url(
        &self,
        url: &str,
        artist: &str,
        title: &str,
        cache_dir: &Path,
    ) -> Result<PathBuf, AcquisitionError> {
        let filename = format!("{} - {}.mp3", sanitize_name(artist), sanitize_name(title));
        let dest = cache_dir.join(filename);

        self.pacer.pace().await;
        self.run(url, &dest).await?;
        Ok(dest)
    }

    async fn run(&self, target: &str, dest: &Path) -> Result<(), AcquisitionError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!(target, dest = %dest.display(), "invoking ripper");

        let output = Command::new(&self.bin)
            .args([
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "0",
                "--no-playlist",
                "--quiet",
                "-o",
            ])
            .arg(dest)
            .arg(target)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                AcquisitionError::Ripper(format!("failed to spawn {}: {}", self.bin, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AcquisitionError::Ripper(stderr.trim().to_string()));
        }

        if !dest.exists() {
            return Err(AcquisitionError::Ripper(
                "ripper reported success but produced no file".to_string(),
            ));
        }

        info!(dest = %dest.display(), "rip complete");
        Ok(())
    }
}

#[async_trait]
impl AcquisitionSource for MediaRipperSource {
    fn label(&self) -> &'static str {
        "ripper"
    }

    async fn acquire(&self, track: &Track, dest: &Path) -> Result<bool, AcquisitionError> {
        // Prefer an explicit media page; fall back to a platform search.
        let target = match &track.page_url {
            Some(url) => url.clone(),
            None => format!("scsearch1:{} {}", track.artist, track.title),
        };

        self.pacer.pace().await;
        self.run(&target, dest).await?;
        Ok(true)
    }
}
