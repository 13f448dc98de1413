//! Track data model.
//!
//! Defines the loosely-populated track record produced by discovery sources,
//! its provenance tag, and the case-insensitive identity used for
//! deduplication and store upserts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which discovery path produced a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackSource {
    StorefrontApi,
    StorefrontCharts,
    LabelSearch,
    ArtistSearch,
    Scout,
    Library,
}

impl TrackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSource::StorefrontApi => "storefront_api",
            TrackSource::StorefrontCharts => "storefront_charts",
            TrackSource::LabelSearch => "label_search",
            TrackSource::ArtistSearch => "artist_search",
            TrackSource::Scout => "scout",
            TrackSource::Library => "library",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "storefront_api" => Some(TrackSource::StorefrontApi),
            "storefront_charts" => Some(TrackSource::StorefrontCharts),
            "label_search" => Some(TrackSource::LabelSearch),
            "artist_search" => Some(TrackSource::ArtistSearch),
            "scout" => Some(TrackSource::Scout),
            "library" => Some(TrackSource::Library),
            _ => None,
        }
    }
}

/// Case-insensitive (artist, title) pair.
///
/// This is the only identity a track has at the core level: two candidates
/// with the same identity are the same track regardless of which source
/// produced them or how their metadata differs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackIdentity {
    artist: String,
    title: String,
}

impl TrackIdentity {
    pub fn new(artist: &str, title: &str) -> Self {
        Self {
            artist: artist.trim().to_lowercase(),
            title: title.trim().to_lowercase(),
        }
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

/// A discovered track.
///
/// Created loosely populated by whichever source found it, then enriched
/// (missing fields filled in, score recomputed) zero or more times before
/// ranking decides its fate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub artist: String,
    /// Tempo in beats per minute, if known.
    pub bpm: Option<u32>,
    /// Musical key (e.g., "A min").
    pub key: Option<String>,
    pub genre: Option<String>,
    pub label: Option<String>,
    pub release_date: Option<String>,
    /// Which source produced this candidate.
    pub source: TrackSource,
    /// Style-match score in [0, 1]. Recomputed whenever enrichment adds
    /// fields; the ranking pass may apply a tempo penalty to it once.
    pub style_score: f64,
    /// Popularity in [0, 1], source-supplied (e.g., chart position) or the
    /// 0.5 default.
    pub popularity: f64,
    /// Row id in the local store, once persisted.
    pub store_id: Option<i64>,
    /// External id at the storefront, if known.
    pub storefront_id: Option<String>,
    pub storefront_url: Option<String>,
    /// Direct audio download URL, if the source offered one.
    pub download_url: Option<String>,
    /// Media/social page URL usable by the ripper fallback.
    pub page_url: Option<String>,
    /// Source-specific fields that have no dedicated column.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl Track {
    /// Create a minimally-populated track.
    pub fn new(artist: impl Into<String>, title: impl Into<String>, source: TrackSource) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            bpm: None,
            key: None,
            genre: None,
            label: None,
            release_date: None,
            source,
            style_score: 0.0,
            popularity: 0.5,
            store_id: None,
            storefront_id: None,
            storefront_url: None,
            download_url: None,
            page_url: None,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_bpm(mut self, bpm: u32) -> Self {
        self.bpm = Some(bpm);
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = popularity.clamp(0.0, 1.0);
        self
    }

    /// The dedup/upsert identity of this track.
    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity::new(&self.artist, &self.title)
    }

    /// "Artist - Title", the human-facing name used in logs and filenames.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }

    /// Returns true if tempo or key is still unknown, i.e. enrichment could
    /// add something scoring cares about.
    pub fn needs_enrichment(&self) -> bool {
        self.bpm.is_none() || self.key.is_none()
    }

    /// Fill this track's empty fields from `other`, leaving populated fields
    /// untouched. Safe to apply repeatedly with the same `other`.
    pub fn merge_missing_from(&mut self, other: &Track) {
        if self.bpm.is_none() {
            self.bpm = other.bpm;
        }
        if self.key.is_none() {
            self.key = other.key.clone();
        }
        if self.genre.is_none() {
            self.genre = other.genre.clone();
        }
        if self.label.is_none() {
            self.label = other.label.clone();
        }
        if self.release_date.is_none() {
            self.release_date = other.release_date.clone();
        }
        if self.storefront_id.is_none() {
            self.storefront_id = other.storefront_id.clone();
        }
        if self.storefront_url.is_none() {
            self.storefront_url = other.storefront_url.clone();
        }
        if self.download_url.is_none() {
            self.download_url = other.download_url.clone();
        }
        if self.page_url.is_none() {
            self.page_url = other.page_url.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_source_conversion() {
        assert_eq!(TrackSource::Scout.as_str(), "scout");
        assert_eq!(TrackSource::StorefrontCharts.as_str(), "storefront_charts");

        assert_eq!(TrackSource::from_str("scout"), Some(TrackSource::Scout));
        assert_eq!(
            TrackSource::from_str("label_search"),
            Some(TrackSource::LabelSearch)
        );
        assert_eq!(TrackSource::from_str("invalid"), None);
    }

    #[test]
    fn test_identity_is_case_insensitive() {
        let a = TrackIdentity::new("Dom Dolla", "Girl$");
        let b = TrackIdentity::new("dom dolla", "GIRL$");
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_trims_whitespace() {
        let a = TrackIdentity::new(" Mau P ", "Drugs From Amsterdam");
        let b = TrackIdentity::new("Mau P", "Drugs From Amsterdam");
        assert_eq!(a, b);
    }

    #[test]
    fn test_new_track_defaults() {
        let track = Track::new("John Summit", "La Danza", TrackSource::StorefrontApi);
        assert_eq!(track.style_score, 0.0);
        assert_eq!(track.popularity, 0.5);
        assert!(track.bpm.is_none());
        assert!(track.needs_enrichment());
    }

    #[test]
    fn test_needs_enrichment() {
        let mut track = Track::new("a", "t", TrackSource::Scout).with_bpm(124);
        assert!(track.needs_enrichment()); // key still missing

        track.key = Some("A min".to_string());
        assert!(!track.needs_enrichment());
    }

    #[test]
    fn test_merge_missing_keeps_existing_fields() {
        let mut track = Track::new("a", "t", TrackSource::Scout)
            .with_bpm(126)
            .with_genre("Tech House");

        let other = Track::new("a", "t", TrackSource::StorefrontApi)
            .with_bpm(128)
            .with_label("Insomniac Records");

        track.merge_missing_from(&other);

        // bpm was already set, must not be overwritten
        assert_eq!(track.bpm, Some(126));
        assert_eq!(track.genre.as_deref(), Some("Tech House"));
        assert_eq!(track.label.as_deref(), Some("Insomniac Records"));
    }

    #[test]
    fn test_merge_missing_is_idempotent() {
        let mut track = Track::new("a", "t", TrackSource::Scout);
        let other = Track::new("a", "t", TrackSource::StorefrontApi).with_bpm(122);

        track.merge_missing_from(&other);
        let after_first = track.clone();
        track.merge_missing_from(&other);

        assert_eq!(track.bpm, after_first.bpm);
        assert_eq!(track.key, after_first.key);
    }

    #[test]
    fn test_popularity_is_clamped() {
        let track = Track::new("a", "t", TrackSource::Scout).with_popularity(1.5);
        assert_eq!(track.popularity, 1.0);
    }
}
