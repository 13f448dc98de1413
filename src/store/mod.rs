//! Persistent track storage.
//!
//! Every candidate that passes through discovery is written here exactly
//! once per run via an idempotent upsert keyed by the case-insensitive
//! (artist, title) identity.

mod schema;
mod sqlite_store;

pub use sqlite_store::SqliteTrackStore;

use crate::track::Track;
use anyhow::Result;

/// Summary counters for the `stats` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total_tracks: usize,
    pub total_playlists: usize,
    pub total_searches: usize,
    /// Tracks with style score above 0.8.
    pub high_score_tracks: usize,
    /// Tracks first seen in the last 30 days.
    pub recent_discoveries: usize,
}

/// Storage operations the discovery orchestrator and CLI depend on.
pub trait TrackStore: Send + Sync {
    /// Insert or refresh a track, keyed by identity. Returns the row id.
    ///
    /// Repeated upserts of the same identity must not create duplicate rows,
    /// must never lower a stored style score, and may fill metadata fields
    /// but never blank them.
    fn upsert_track(&self, track: &Track) -> Result<i64>;

    /// Look up a track by identity (case-insensitive).
    fn get_track(&self, artist: &str, title: &str) -> Result<Option<Track>>;

    /// All tracks with `style_score >= min_score`, best first.
    fn tracks_by_min_score(&self, min_score: f64) -> Result<Vec<Track>>;

    /// Persist a playlist over already-stored track ids.
    fn create_playlist(&self, name: &str, track_ids: &[i64], description: &str) -> Result<i64>;

    /// Record one discovery query and how many results it yielded.
    fn log_search(&self, query: &str, source: &str, results_count: usize) -> Result<()>;

    fn stats(&self) -> Result<StoreStats>;
}
