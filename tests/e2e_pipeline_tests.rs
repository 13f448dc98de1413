//! End-to-end pipeline tests over in-memory fake collaborators.

use async_trait::async_trait;
use cratedigger::acquisition::{AcquisitionError, AcquisitionManager, AcquisitionSource};
use cratedigger::config::DiscoverySettings;
use cratedigger::discovery::{
    ArtistScout, CatalogSearch, DiscoveryOrchestrator, MetadataEnricher,
};
use cratedigger::export::UsbExporter;
use cratedigger::pipeline::AutomationPipeline;
use cratedigger::processing::{ProcessingError, TrackProcessor};
use cratedigger::store::{SqliteTrackStore, TrackStore};
use cratedigger::style::StyleProfile;
use cratedigger::track::{Track, TrackSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Acquisition succeeds only for tracks tagged "dl:ok".
struct TaggedAcquirer;

#[async_trait]
impl AcquisitionSource for TaggedAcquirer {
    fn label(&self) -> &'static str {
        "tagged"
    }

    async fn acquire(&self, track: &Track, dest: &Path) -> Result<bool, AcquisitionError> {
        if track.extras.get("dl").map(String::as_str) == Some("ok") {
            tokio::fs::write(dest, b"raw audio").await?;
            Ok(true)
        } else {
            Err(AcquisitionError::Download("mirror offline".to_string()))
        }
    }
}

/// Processing succeeds unless the track is tagged "proc:fail"; successful
/// tracks are "normalized" by copying into the processed directory.
struct TaggedProcessor {
    output_dir: PathBuf,
}

#[async_trait]
impl TrackProcessor for TaggedProcessor {
    async fn process_track(
        &self,
        input: &Path,
        track: &Track,
    ) -> Result<PathBuf, ProcessingError> {
        if track.extras.get("proc").map(String::as_str) == Some("fail") {
            return Err(ProcessingError::ConversionFailed(
                "unsupported codec".to_string(),
            ));
        }
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self.output_dir.join(input.file_name().unwrap());
        tokio::fs::copy(input, &output).await?;
        Ok(output)
    }
}

fn make_track(title: &str, downloadable: bool, processable: bool) -> Track {
    let mut track = Track::new("Test Artist", title, TrackSource::StorefrontApi).with_bpm(124);
    if downloadable {
        track.extras.insert("dl".to_string(), "ok".to_string());
    }
    if !processable {
        track.extras.insert("proc".to_string(), "fail".to_string());
    }
    track
}

fn make_pipeline(dir: &TempDir) -> AutomationPipeline {
    let acquisition = Arc::new(
        AcquisitionManager::new(vec![Arc::new(TaggedAcquirer)], dir.path().join("cache")).unwrap(),
    );
    let processor = Arc::new(TaggedProcessor {
        output_dir: dir.path().join("processed"),
    });
    let exporter = Arc::new(UsbExporter::new(dir.path().join("usb")));
    AutomationPipeline::new(acquisition, processor, exporter, CancellationToken::new())
}

/// The canonical partial-failure scenario: 5 submitted, 3 acquire, 2 of
/// those process, export runs over the survivors.
#[tokio::test]
async fn test_partial_failure_counts_and_manifest() {
    let dir = TempDir::new().unwrap();
    let pipeline = make_pipeline(&dir);

    let tracks = vec![
        make_track("One", true, true),
        make_track("Two", true, true),
        make_track("Three", true, false), // fails processing
        make_track("Four", false, true),  // fails acquisition
        make_track("Five", false, true),  // fails acquisition
    ];

    let report = pipeline.run(tracks, "Partial Set").await.unwrap();

    assert_eq!(report.total, 5);
    assert_eq!(report.acquired, 3);
    assert_eq!(report.processed, 2);
    assert_eq!(report.exported, 2);
    assert_eq!(report.errors.len(), 3);
    assert!(!report.cancelled);

    let summary = report.export.expect("export bundle should exist");
    assert_eq!(summary.track_count, 2);
    assert!(summary.validation.valid);

    let xml = std::fs::read_to_string(&summary.xml_path).unwrap();
    assert!(xml.contains("One"));
    assert!(xml.contains("Two"));
    assert!(!xml.contains("Three"));
}

#[tokio::test]
async fn test_zero_survivors_skips_export_without_error() {
    let dir = TempDir::new().unwrap();
    let pipeline = make_pipeline(&dir);

    let tracks = vec![
        make_track("One", false, true),
        make_track("Two", true, false),
    ];

    let report = pipeline.run(tracks, "Doomed Set").await.unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.acquired, 1);
    assert_eq!(report.processed, 0);
    assert_eq!(report.exported, 0);
    assert!(report.export.is_none());
    // One acquisition failure + one processing failure.
    assert_eq!(report.errors.len(), 2);
}

#[tokio::test]
async fn test_second_run_reuses_cache() {
    let dir = TempDir::new().unwrap();

    let pipeline = make_pipeline(&dir);
    let first = pipeline
        .run(vec![make_track("One", true, true)], "Set")
        .await
        .unwrap();
    assert_eq!(first.exported, 1);

    // Second run: acquisition source would fail (no "dl:ok" tag), but the
    // cache already holds the file from the first run.
    let pipeline = make_pipeline(&dir);
    let second = pipeline
        .run(vec![make_track("One", false, true)], "Set")
        .await
        .unwrap();
    assert_eq!(second.acquired, 1);
    assert_eq!(second.exported, 1);
    assert!(second.errors.is_empty());
}

// --- discovery + pipeline end to end ------------------------------------

struct StaticScout;

#[async_trait]
impl ArtistScout for StaticScout {
    async fn similar_artist_tracks(&self, _limit: usize) -> anyhow::Result<Vec<Track>> {
        let mut track = Track::new("Scouted", "Find", TrackSource::Scout).with_bpm(125);
        track.extras.insert("dl".to_string(), "ok".to_string());
        Ok(vec![track])
    }
}

struct StaticCatalog;

#[async_trait]
impl CatalogSearch for StaticCatalog {
    async fn label_releases(&self, _label: &str, _limit: usize) -> anyhow::Result<Vec<Track>> {
        Ok(vec![])
    }

    async fn genre_charts(&self, _genre: &str, _limit: usize) -> anyhow::Result<Vec<Track>> {
        let mut a = Track::new("Charted", "Banger", TrackSource::StorefrontCharts)
            .with_bpm(126)
            .with_genre("tech house")
            .with_popularity(0.9);
        a.extras.insert("dl".to_string(), "ok".to_string());

        // Same identity as the scout result, lower score metadata-wise; the
        // scout copy has no genre, so this one must win dedup.
        let mut dup = Track::new("scouted", "find", TrackSource::StorefrontCharts)
            .with_bpm(125)
            .with_genre("tech house");
        dup.extras.insert("dl".to_string(), "ok".to_string());

        Ok(vec![a, dup])
    }

    async fn artist_tracks(&self, _artist: &str, _limit: usize) -> anyhow::Result<Vec<Track>> {
        Ok(vec![])
    }
}

struct NoopEnricher;

#[async_trait]
impl MetadataEnricher for NoopEnricher {
    async fn enrich(&self, track: &Track) -> anyhow::Result<Track> {
        Ok(track.clone())
    }
}

#[tokio::test]
async fn test_discover_then_automate_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteTrackStore::in_memory().unwrap());

    let orchestrator = DiscoveryOrchestrator::new(
        Arc::new(StaticScout),
        Arc::new(StaticCatalog),
        Arc::new(NoopEnricher),
        store.clone(),
        StyleProfile::default(),
        DiscoverySettings::default(),
    );

    let outcome = orchestrator.discover(10).await.unwrap();

    // Three candidates, two unique identities.
    assert_eq!(outcome.candidates_seen, 3);
    assert_eq!(outcome.tracks.len(), 2);
    assert_eq!(store.stats().unwrap().total_tracks, 2);

    // The deduplicated "Scouted - Find" must carry the higher-scored
    // (genre-bearing) instance's metadata.
    let scouted = outcome
        .tracks
        .iter()
        .find(|t| t.title.eq_ignore_ascii_case("find"))
        .unwrap();
    assert_eq!(scouted.genre.as_deref(), Some("tech house"));

    let pipeline = make_pipeline(&dir);
    let report = pipeline.run(outcome.tracks, "Dig Result").await.unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.exported, 2);
    assert!(report.errors.is_empty());
    assert!(report.export.unwrap().validation.valid);
}
