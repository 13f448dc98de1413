//! Direct-URL acquisition source.
//!
//! Streams a track's direct download URL to the cache. Only applies to
//! tracks whose discovery source supplied one.

use super::{AcquisitionError, AcquisitionSource};
use crate::pacing::Pacer;
use crate::track::Track;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub struct DirectUrlSource {
    client: reqwest::Client,
    pacer: Pacer,
}

impl DirectUrlSource {
    pub fn new(timeout_secs: u64, interval_ms: u64) -> Result<Self, AcquisitionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AcquisitionError::Download(e.to_string()))?;

        Ok(Self {
            client,
            pacer: Pacer::from_millis(interval_ms),
        })
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, AcquisitionError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AcquisitionError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AcquisitionError::Download(format!(
                "status {}",
                response.status()
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    // Drop the partial file so a later cache check does not
                    // mistake it for a finished download.
                    drop(file);
                    let _ = tokio::fs::remove_file(dest).await;
                    return Err(AcquisitionError::Download(e.to_string()));
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url, bytes = written, "direct download complete");
        Ok(written)
    }
}

#[async_trait]
impl AcquisitionSource for DirectUrlSource {
    fn label(&self) -> &'static str {
        "direct"
    }

    async fn acquire(&self, track: &Track, dest: &Path) -> Result<bool, AcquisitionError> {
        let Some(url) = &track.download_url else {
            return Ok(false);
        };

        self.pacer.pace().await;
        self.download_to(url, dest).await?;
        Ok(true)
    }
}
