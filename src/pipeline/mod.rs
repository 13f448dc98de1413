//! Acquire → process → export orchestration.
//!
//! Three sequential phases over one batch of tracks. Each track carries an
//! explicit phase tag, so a failure is attributable and one track's failure
//! never touches its neighbours. Only shared infrastructure breaking (the
//! export bundle directories) aborts the whole run.

use crate::acquisition::AcquisitionManager;
use crate::export::{ExportSummary, UsbExporter};
use crate::processing::TrackProcessor;
use crate::track::Track;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Pipeline phases, for failure attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Acquisition,
    Processing,
    Export,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Acquisition => "acquisition",
            Phase::Processing => "processing",
            Phase::Export => "export",
        }
    }
}

/// Where a single track currently stands in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackPhase {
    Pending,
    Acquired(PathBuf),
    Processed(PathBuf),
    Exported(PathBuf),
    Failed { phase: Phase, reason: String },
}

impl TrackPhase {
    pub fn is_failed(&self) -> bool {
        matches!(self, TrackPhase::Failed { .. })
    }
}

/// A track moving through the pipeline with its current state.
#[derive(Debug, Clone)]
pub struct PipelineTrack {
    pub track: Track,
    pub phase: TrackPhase,
}

/// Aggregate result of one pipeline run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub playlist_name: String,
    pub total: usize,
    pub acquired: usize,
    pub processed: usize,
    pub exported: usize,
    /// Non-fatal per-track failures, in occurrence order.
    pub errors: Vec<String>,
    /// The export bundle, absent when zero tracks survived processing or
    /// the run was cancelled before export.
    pub export: Option<ExportSummary>,
    pub cancelled: bool,
}

/// The batch orchestrator for the download-to-USB flow.
pub struct AutomationPipeline {
    acquisition: Arc<AcquisitionManager>,
    processor: Arc<dyn TrackProcessor>,
    exporter: Arc<UsbExporter>,
    cancel: CancellationToken,
}

impl AutomationPipeline {
    pub fn new(
        acquisition: Arc<AcquisitionManager>,
        processor: Arc<dyn TrackProcessor>,
        exporter: Arc<UsbExporter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            acquisition,
            processor,
            exporter,
            cancel,
        }
    }

    /// Run the full pipeline over `tracks`.
    ///
    /// The returned report always accounts for every submitted track;
    /// `Err` is reserved for infrastructure failures.
    pub async fn run(&self, tracks: Vec<Track>, playlist_name: &str) -> Result<PipelineReport> {
        let mut report = PipelineReport {
            playlist_name: playlist_name.to_string(),
            total: tracks.len(),
            ..Default::default()
        };

        let mut items: Vec<PipelineTrack> = tracks
            .into_iter()
            .map(|track| PipelineTrack {
                track,
                phase: TrackPhase::Pending,
            })
            .collect();

        self.acquisition_phase(&mut items, &mut report).await;
        if !report.cancelled {
            self.processing_phase(&mut items, &mut report).await;
        }
        if !report.cancelled {
            self.export_phase(&mut items, &mut report).await?;
        }

        report.acquired = items
            .iter()
            .filter(|i| {
                matches!(
                    i.phase,
                    TrackPhase::Acquired(_) | TrackPhase::Processed(_) | TrackPhase::Exported(_)
                ) || matches!(
                    &i.phase,
                    TrackPhase::Failed { phase, .. } if *phase != Phase::Acquisition
                )
            })
            .count();
        report.processed = items
            .iter()
            .filter(|i| {
                matches!(i.phase, TrackPhase::Processed(_) | TrackPhase::Exported(_))
                    || matches!(
                        &i.phase,
                        TrackPhase::Failed { phase, .. } if *phase == Phase::Export
                    )
            })
            .count();
        report.exported = items
            .iter()
            .filter(|i| matches!(i.phase, TrackPhase::Exported(_)))
            .count();

        info!(
            total = report.total,
            acquired = report.acquired,
            processed = report.processed,
            exported = report.exported,
            errors = report.errors.len(),
            "pipeline complete"
        );

        Ok(report)
    }

    async fn acquisition_phase(&self, items: &mut [PipelineTrack], report: &mut PipelineReport) {
        info!(count = items.len(), "acquisition phase starting");

        for item in items.iter_mut() {
            if self.cancel.is_cancelled() {
                info!("cancellation requested, stopping before next acquisition");
                report.cancelled = true;
                return;
            }

            match self.acquisition.acquire(&item.track).await {
                Ok(path) => item.phase = TrackPhase::Acquired(path),
                Err(e) => {
                    warn!(track = %item.track.display_name(), error = %e, "acquisition failed");
                    report
                        .errors
                        .push(format!("acquire {}: {}", item.track.display_name(), e));
                    item.phase = TrackPhase::Failed {
                        phase: Phase::Acquisition,
                        reason: e.to_string(),
                    };
                }
            }
        }
    }

    async fn processing_phase(&self, items: &mut [PipelineTrack], report: &mut PipelineReport) {
        let pending: usize = items
            .iter()
            .filter(|i| matches!(i.phase, TrackPhase::Acquired(_)))
            .count();
        info!(count = pending, "processing phase starting");

        for item in items.iter_mut() {
            let TrackPhase::Acquired(input) = item.phase.clone() else {
                continue;
            };

            if self.cancel.is_cancelled() {
                info!("cancellation requested, stopping before next conversion");
                report.cancelled = true;
                return;
            }

            match self.processor.process_track(&input, &item.track).await {
                Ok(output) => item.phase = TrackPhase::Processed(output),
                Err(e) => {
                    warn!(track = %item.track.display_name(), error = %e, "processing failed");
                    report
                        .errors
                        .push(format!("process {}: {}", item.track.display_name(), e));
                    item.phase = TrackPhase::Failed {
                        phase: Phase::Processing,
                        reason: e.to_string(),
                    };
                }
            }
        }
    }

    async fn export_phase(
        &self,
        items: &mut [PipelineTrack],
        report: &mut PipelineReport,
    ) -> Result<()> {
        let ready: Vec<(Track, PathBuf)> = items
            .iter()
            .filter_map(|i| match &i.phase {
                TrackPhase::Processed(path) => Some((i.track.clone(), path.clone())),
                _ => None,
            })
            .collect();

        if ready.is_empty() {
            info!("no processed tracks, skipping export");
            return Ok(());
        }

        info!(count = ready.len(), "export phase starting");

        // Infrastructure failures (e.g. the bundle directory cannot be
        // created) propagate and abort the run.
        let summary = self.exporter.export(&ready, &report.playlist_name).await?;

        for item in items.iter_mut() {
            if !matches!(item.phase, TrackPhase::Processed(_)) {
                continue;
            }
            let staged = summary
                .staged
                .iter()
                .find(|s| s.track.identity() == item.track.identity());
            match staged {
                Some(s) => item.phase = TrackPhase::Exported(s.path.clone()),
                None => {
                    report.errors.push(format!(
                        "export {}: failed to stage file",
                        item.track.display_name()
                    ));
                    item.phase = TrackPhase::Failed {
                        phase: Phase::Export,
                        reason: "failed to stage file".to_string(),
                    };
                }
            }
        }

        report.export = Some(summary);
        Ok(())
    }
}
