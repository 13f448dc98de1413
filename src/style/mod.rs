//! Style profile and compatibility scoring.
//!
//! The scorer is a pure function: no I/O, no clock, no ambient state. It is
//! invoked repeatedly during enrichment and re-ranking, so determinism here
//! keeps the whole discovery pass deterministic.

use crate::track::Track;
use serde::{Deserialize, Serialize};

/// Weight awarded for a tempo inside the strict range.
pub const TEMPO_WEIGHT: f64 = 0.3;
/// Weight awarded for a tempo inside the acceptable-but-not-ideal range.
pub const TEMPO_WEIGHT_ACCEPTABLE: f64 = 0.15;
/// Weight awarded for a genre match.
pub const GENRE_WEIGHT: f64 = 0.25;
/// Weight awarded for a label match.
pub const LABEL_WEIGHT: f64 = 0.2;
/// Weight awarded for a reference-artist match.
pub const ARTIST_WEIGHT: f64 = 0.25;

/// Immutable reference configuration describing the target sound.
///
/// Built once from config and passed by reference everywhere; never mutated
/// at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StyleProfile {
    /// Genre substrings that count as a match.
    pub genres: Vec<String>,
    /// Strict BPM range (inclusive).
    pub tempo_range: (u32, u32),
    /// Broader BPM range (inclusive) tolerated with a score penalty.
    pub acceptable_tempo_range: (u32, u32),
    /// Multiplier applied once, at ranking time, to acceptable-range tracks.
    pub tempo_penalty: f64,
    /// Reference label substrings.
    pub labels: Vec<String>,
    /// Reference artist substrings.
    pub similar_artists: Vec<String>,
}

impl Default for StyleProfile {
    fn default() -> Self {
        Self {
            genres: vec![
                "tech house".to_string(),
                "house".to_string(),
                "disco house".to_string(),
                "funky house".to_string(),
            ],
            tempo_range: (120, 128),
            acceptable_tempo_range: (115, 135),
            tempo_penalty: 0.8,
            labels: vec![
                "Sony Music Entertainment".to_string(),
                "Big Beat Records".to_string(),
                "Insomniac Records".to_string(),
                "Good Good Records".to_string(),
                "DistroKid".to_string(),
                "UMe Direct 2".to_string(),
                "Fantastic Trax".to_string(),
                "TH3RD BRAIN".to_string(),
                "Boom Records LLC".to_string(),
            ],
            similar_artists: vec![
                "SIDEPIECE".to_string(),
                "John Summit".to_string(),
                "Mau P".to_string(),
                "Dom Dolla".to_string(),
                "Fred Again".to_string(),
                "Justin Jay".to_string(),
                "GUDFELLA".to_string(),
                "INJI".to_string(),
            ],
        }
    }
}

/// How a known or unknown tempo relates to the profile's ranges.
///
/// A known tempo falls in exactly one of Ideal / Acceptable / Out; an
/// unknown tempo is its own case and is exempt from tempo filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoFit {
    Ideal,
    Acceptable,
    Out,
    Unknown,
}

impl StyleProfile {
    /// Partition a tempo against the strict and broad ranges.
    pub fn tempo_fit(&self, bpm: Option<u32>) -> TempoFit {
        let Some(bpm) = bpm else {
            return TempoFit::Unknown;
        };
        let (lo, hi) = self.tempo_range;
        if bpm >= lo && bpm <= hi {
            return TempoFit::Ideal;
        }
        let (alo, ahi) = self.acceptable_tempo_range;
        if bpm >= alo && bpm <= ahi {
            return TempoFit::Acceptable;
        }
        TempoFit::Out
    }

    /// The lead genre, used for chart lookups ("tech house" → "tech-house").
    pub fn lead_genre_slug(&self) -> String {
        self.genres
            .first()
            .map(|g| g.to_lowercase().replace(' ', "-"))
            .unwrap_or_else(|| "tech-house".to_string())
    }
}

/// Score a track against the profile.
///
/// Additive weighted scoring clamped to [0, 1]. Each category contributes at
/// most once; the first matching entry in a profile list wins.
pub fn score(track: &Track, profile: &StyleProfile) -> f64 {
    let mut total = 0.0;

    match profile.tempo_fit(track.bpm) {
        TempoFit::Ideal => total += TEMPO_WEIGHT,
        TempoFit::Acceptable => total += TEMPO_WEIGHT_ACCEPTABLE,
        TempoFit::Out | TempoFit::Unknown => {}
    }

    if let Some(genre) = &track.genre {
        let genre = genre.to_lowercase();
        if profile
            .genres
            .iter()
            .any(|g| genre.contains(&g.to_lowercase()))
        {
            total += GENRE_WEIGHT;
        }
    }

    if let Some(label) = &track.label {
        let label = label.to_lowercase();
        if profile
            .labels
            .iter()
            .any(|l| label.contains(&l.to_lowercase()))
        {
            total += LABEL_WEIGHT;
        }
    }

    let artist = track.artist.to_lowercase();
    if profile
        .similar_artists
        .iter()
        .any(|a| artist.contains(&a.to_lowercase()))
    {
        total += ARTIST_WEIGHT;
    }

    total.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackSource;

    fn make_track() -> Track {
        Track::new("Nobody", "Blank", TrackSource::StorefrontApi)
    }

    #[test]
    fn test_tempo_fit_partition() {
        let profile = StyleProfile::default();

        assert_eq!(profile.tempo_fit(Some(120)), TempoFit::Ideal);
        assert_eq!(profile.tempo_fit(Some(128)), TempoFit::Ideal);
        assert_eq!(profile.tempo_fit(Some(124)), TempoFit::Ideal);
        assert_eq!(profile.tempo_fit(Some(115)), TempoFit::Acceptable);
        assert_eq!(profile.tempo_fit(Some(131)), TempoFit::Acceptable);
        assert_eq!(profile.tempo_fit(Some(135)), TempoFit::Acceptable);
        assert_eq!(profile.tempo_fit(Some(140)), TempoFit::Out);
        assert_eq!(profile.tempo_fit(Some(100)), TempoFit::Out);
        assert_eq!(profile.tempo_fit(None), TempoFit::Unknown);
    }

    #[test]
    fn test_tempo_weights() {
        let profile = StyleProfile::default();

        let strict = make_track().with_bpm(124);
        assert_eq!(score(&strict, &profile), TEMPO_WEIGHT);

        let broad = make_track().with_bpm(131);
        assert_eq!(score(&broad, &profile), TEMPO_WEIGHT_ACCEPTABLE);

        let out = make_track().with_bpm(150);
        assert_eq!(score(&out, &profile), 0.0);

        let unknown = make_track();
        assert_eq!(score(&unknown, &profile), 0.0);
    }

    #[test]
    fn test_genre_match_is_substring_and_case_insensitive() {
        let profile = StyleProfile::default();
        let track = make_track().with_genre("Melodic TECH HOUSE");
        assert_eq!(score(&track, &profile), GENRE_WEIGHT);
    }

    #[test]
    fn test_genre_awarded_once() {
        // "disco house" also contains "house"; only one genre weight applies.
        let profile = StyleProfile::default();
        let track = make_track().with_genre("disco house");
        assert_eq!(score(&track, &profile), GENRE_WEIGHT);
    }

    #[test]
    fn test_label_match() {
        let profile = StyleProfile::default();
        let track = make_track().with_label("insomniac records / imprint");
        assert_eq!(score(&track, &profile), LABEL_WEIGHT);
    }

    #[test]
    fn test_artist_match() {
        let profile = StyleProfile::default();
        let track = Track::new("Dom Dolla & Friends", "Blank", TrackSource::Scout);
        assert_eq!(score(&track, &profile), ARTIST_WEIGHT);
    }

    #[test]
    fn test_all_categories_sum_and_clamp() {
        let profile = StyleProfile::default();
        let track = Track::new("John Summit", "Full Match", TrackSource::StorefrontApi)
            .with_bpm(125)
            .with_genre("tech house")
            .with_label("Insomniac Records");

        // 0.3 + 0.25 + 0.2 + 0.25 = 1.0, clamp is a no-op here
        assert_eq!(score(&track, &profile), 1.0);
    }

    #[test]
    fn test_score_never_exceeds_one() {
        let profile = StyleProfile {
            genres: vec!["a".to_string()],
            labels: vec!["b".to_string()],
            similar_artists: vec!["c".to_string()],
            ..StyleProfile::default()
        };
        let track = Track::new("c", "t", TrackSource::Scout)
            .with_bpm(124)
            .with_genre("a")
            .with_label("b");
        let s = score(&track, &profile);
        assert!(s <= 1.0);
        assert!(s >= 0.0);
    }

    #[test]
    fn test_score_is_deterministic() {
        let profile = StyleProfile::default();
        let track = make_track().with_bpm(124).with_genre("house");
        assert_eq!(score(&track, &profile), score(&track, &profile));
    }

    #[test]
    fn test_lead_genre_slug() {
        let profile = StyleProfile::default();
        assert_eq!(profile.lead_genre_slug(), "tech-house");

        let empty = StyleProfile {
            genres: vec![],
            ..StyleProfile::default()
        };
        assert_eq!(empty.lead_genre_slug(), "tech-house");
    }
}
