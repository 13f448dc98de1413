//! Database schema for tracks.db.

/// Current schema version, recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

/// Full schema, applied in one batch when the database is new.
///
/// Track identity is the case-insensitive (artist, title) pair; the unique
/// index backs the idempotent upsert so repeated runs never create
/// duplicate rows.
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL COLLATE NOCASE,
    artist TEXT NOT NULL COLLATE NOCASE,
    bpm INTEGER,
    key TEXT,
    genre TEXT,
    label TEXT,
    release_date TEXT,
    storefront_id TEXT,
    storefront_url TEXT,
    download_url TEXT,
    page_url TEXT,
    popularity REAL NOT NULL DEFAULT 0.5,
    style_score REAL NOT NULL DEFAULT 0.0,
    source TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE(artist, title)
);

CREATE INDEX IF NOT EXISTS idx_tracks_style_score ON tracks(style_score);
CREATE INDEX IF NOT EXISTS idx_tracks_created_at ON tracks(created_at);

CREATE TABLE IF NOT EXISTS playlists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    track_ids TEXT NOT NULL,
    track_count INTEGER NOT NULL DEFAULT 0,
    avg_bpm REAL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS search_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    source TEXT NOT NULL,
    results_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);
";
