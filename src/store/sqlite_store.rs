//! SQLite-backed track store.

use super::schema::{SCHEMA_SQL, SCHEMA_VERSION};
use super::{StoreStats, TrackStore};
use crate::track::{Track, TrackSource};
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Track store backed by a single SQLite database file.
///
/// The connection lives behind a mutex; run volumes here are tens of rows,
/// so one serialized connection is plenty.
pub struct SqliteTrackStore {
    conn: Mutex<Connection>,
}

impl SqliteTrackStore {
    /// Open (and create/migrate if needed) the database at `path`.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open track database at {:?}", path))?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version == 0 {
            info!("Initializing track database schema v{}", SCHEMA_VERSION);
            conn.execute_batch(SCHEMA_SQL)
                .context("Failed to apply track database schema")?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        } else if version > SCHEMA_VERSION {
            bail!(
                "Track database schema version {} is newer than supported version {}",
                version,
                SCHEMA_VERSION
            );
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<Track> {
        let source: String = row.get("source")?;
        Ok(Track {
            store_id: Some(row.get("id")?),
            title: row.get("title")?,
            artist: row.get("artist")?,
            bpm: row.get::<_, Option<i64>>("bpm")?.map(|b| b as u32),
            key: row.get("key")?,
            genre: row.get("genre")?,
            label: row.get("label")?,
            release_date: row.get("release_date")?,
            storefront_id: row.get("storefront_id")?,
            storefront_url: row.get("storefront_url")?,
            download_url: row.get("download_url")?,
            page_url: row.get("page_url")?,
            popularity: row.get("popularity")?,
            style_score: row.get("style_score")?,
            source: TrackSource::from_str(&source).unwrap_or(TrackSource::Library),
            extras: Default::default(),
        })
    }
}

impl TrackStore for SqliteTrackStore {
    fn upsert_track(&self, track: &Track) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().timestamp();

        // Identity conflict keeps the row, refreshes metadata, and never
        // lets a lower score overwrite a higher one.
        conn.execute(
            "INSERT INTO tracks (
                title, artist, bpm, key, genre, label, release_date,
                storefront_id, storefront_url, download_url, page_url,
                popularity, style_score, source, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(artist, title) DO UPDATE SET
                bpm = COALESCE(excluded.bpm, bpm),
                key = COALESCE(excluded.key, key),
                genre = COALESCE(excluded.genre, genre),
                label = COALESCE(excluded.label, label),
                release_date = COALESCE(excluded.release_date, release_date),
                storefront_id = COALESCE(excluded.storefront_id, storefront_id),
                storefront_url = COALESCE(excluded.storefront_url, storefront_url),
                download_url = COALESCE(excluded.download_url, download_url),
                page_url = COALESCE(excluded.page_url, page_url),
                popularity = MAX(popularity, excluded.popularity),
                style_score = MAX(style_score, excluded.style_score)",
            params![
                track.title,
                track.artist,
                track.bpm.map(|b| b as i64),
                track.key,
                track.genre,
                track.label,
                track.release_date,
                track.storefront_id,
                track.storefront_url,
                track.download_url,
                track.page_url,
                track.popularity,
                track.style_score,
                track.source.as_str(),
                now,
            ],
        )
        .context("Failed to upsert track")?;

        let id: i64 = conn
            .query_row(
                "SELECT id FROM tracks WHERE artist = ?1 AND title = ?2",
                params![track.artist, track.title],
                |row| row.get(0),
            )
            .context("Upserted track row not found")?;

        Ok(id)
    }

    fn get_track(&self, artist: &str, title: &str) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM tracks WHERE artist = ?1 AND title = ?2",
            params![artist, title],
            Self::row_to_track,
        )
        .optional()
        .context("Failed to look up track")
    }

    fn tracks_by_min_score(&self, min_score: f64) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM tracks
             WHERE style_score >= ?1
             ORDER BY style_score DESC, popularity DESC",
        )?;
        let rows = stmt
            .query_map(params![min_score], Self::row_to_track)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list tracks by score")?;
        Ok(rows)
    }

    fn create_playlist(&self, name: &str, track_ids: &[i64], description: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().timestamp();

        let avg_bpm: Option<f64> = if track_ids.is_empty() {
            None
        } else {
            let placeholders = vec!["?"; track_ids.len()].join(",");
            let sql = format!("SELECT AVG(bpm) FROM tracks WHERE id IN ({})", placeholders);
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_row(rusqlite::params_from_iter(track_ids.iter()), |row| {
                row.get(0)
            })?
        };

        conn.execute(
            "INSERT INTO playlists (name, description, track_ids, track_count, avg_bpm, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                name,
                description,
                serde_json::to_string(track_ids)?,
                track_ids.len() as i64,
                avg_bpm,
                now,
            ],
        )
        .context("Failed to create playlist")?;

        Ok(conn.last_insert_rowid())
    }

    fn log_search(&self, query: &str, source: &str, results_count: usize) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO search_history (query, source, results_count, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                query,
                source,
                results_count as i64,
                chrono::Utc::now().timestamp(),
            ],
        )
        .context("Failed to log search")?;
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().unwrap();

        let total_tracks: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))?;
        let total_playlists: i64 =
            conn.query_row("SELECT COUNT(*) FROM playlists", [], |r| r.get(0))?;
        let total_searches: i64 =
            conn.query_row("SELECT COUNT(*) FROM search_history", [], |r| r.get(0))?;
        let high_score_tracks: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tracks WHERE style_score > 0.8",
            [],
            |r| r.get(0),
        )?;
        let month_ago = chrono::Utc::now().timestamp() - 30 * 24 * 3600;
        let recent_discoveries: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tracks WHERE created_at > ?1",
            params![month_ago],
            |r| r.get(0),
        )?;

        Ok(StoreStats {
            total_tracks: total_tracks as usize,
            total_playlists: total_playlists as usize,
            total_searches: total_searches as usize,
            high_score_tracks: high_score_tracks as usize,
            recent_discoveries: recent_discoveries as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackSource;

    fn make_store() -> SqliteTrackStore {
        SqliteTrackStore::in_memory().unwrap()
    }

    fn make_track(artist: &str, title: &str) -> Track {
        let mut t = Track::new(artist, title, TrackSource::StorefrontApi).with_bpm(124);
        t.style_score = 0.6;
        t
    }

    #[test]
    fn test_upsert_then_get() {
        let store = make_store();
        let id = store.upsert_track(&make_track("Mau P", "Gimme That Bounce")).unwrap();
        assert!(id > 0);

        let found = store.get_track("Mau P", "Gimme That Bounce").unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().bpm, Some(124));
    }

    #[test]
    fn test_upsert_is_idempotent_on_identity() {
        let store = make_store();
        let first = store.upsert_track(&make_track("Artist", "Title")).unwrap();
        // Same identity, different case: must hit the same row.
        let second = store.upsert_track(&make_track("ARTIST", "title")).unwrap();
        assert_eq!(first, second);

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_tracks, 1);
    }

    #[test]
    fn test_upsert_never_lowers_score() {
        let store = make_store();
        let mut high = make_track("a", "t");
        high.style_score = 0.9;
        store.upsert_track(&high).unwrap();

        let mut low = make_track("a", "t");
        low.style_score = 0.2;
        store.upsert_track(&low).unwrap();

        let found = store.get_track("a", "t").unwrap().unwrap();
        assert_eq!(found.style_score, 0.9);
    }

    #[test]
    fn test_upsert_fills_missing_fields_only() {
        let store = make_store();
        let mut with_key = make_track("a", "t");
        with_key.key = Some("A min".to_string());
        store.upsert_track(&with_key).unwrap();

        let mut without_key = make_track("a", "t");
        without_key.key = None;
        without_key.genre = Some("Tech House".to_string());
        store.upsert_track(&without_key).unwrap();

        let found = store.get_track("a", "t").unwrap().unwrap();
        assert_eq!(found.key.as_deref(), Some("A min"));
        assert_eq!(found.genre.as_deref(), Some("Tech House"));
    }

    #[test]
    fn test_tracks_by_min_score_ordering() {
        let store = make_store();
        for (artist, score) in [("low", 0.3), ("high", 0.9), ("mid", 0.6)] {
            let mut t = make_track(artist, "t");
            t.style_score = score;
            store.upsert_track(&t).unwrap();
        }

        let tracks = store.tracks_by_min_score(0.5).unwrap();
        let artists: Vec<&str> = tracks.iter().map(|t| t.artist.as_str()).collect();
        assert_eq!(artists, vec!["high", "mid"]);
    }

    #[test]
    fn test_create_playlist_with_stats() {
        let store = make_store();
        let mut a = make_track("a", "t");
        a.bpm = Some(120);
        let mut b = make_track("b", "t");
        b.bpm = Some(128);
        let ids = vec![
            store.upsert_track(&a).unwrap(),
            store.upsert_track(&b).unwrap(),
        ];

        let playlist_id = store.create_playlist("Test Set", &ids, "desc").unwrap();
        assert!(playlist_id > 0);

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_playlists, 1);
    }

    #[test]
    fn test_create_empty_playlist() {
        let store = make_store();
        let id = store.create_playlist("Empty", &[], "").unwrap();
        assert!(id > 0);
    }

    #[test]
    fn test_search_logging_counts_in_stats() {
        let store = make_store();
        store.log_search("label:Fantastic Trax", "label_search", 7).unwrap();
        store.log_search("tech-house charts", "storefront_charts", 15).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_searches, 2);
    }

    #[test]
    fn test_stats_high_score_threshold() {
        let store = make_store();
        let mut great = make_track("great", "t");
        great.style_score = 0.95;
        store.upsert_track(&great).unwrap();
        store.upsert_track(&make_track("ok", "t")).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_tracks, 2);
        assert_eq!(stats.high_score_tracks, 1);
        assert_eq!(stats.recent_discoveries, 2);
    }
}
