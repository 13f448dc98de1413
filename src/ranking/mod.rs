//! Candidate deduplication and ranking.
//!
//! Merges track lists from every discovery source into one ordered top-N
//! result: dedup by identity keeping the best-scored instance, tempo
//! filtering with a one-shot penalty for acceptable-but-not-ideal tracks,
//! then a stable sort by score and popularity.
//!
//! The tempo penalty is applied here and only here. Scores arriving in the
//! candidate pool must be raw scorer output; enrichment re-scores from
//! metadata, so running the pipeline twice can never compound the penalty.

use crate::style::{StyleProfile, TempoFit};
use crate::track::{Track, TrackIdentity};
use std::collections::HashMap;
use tracing::debug;

/// Deduplicate, filter, and rank candidates; return at most `target_count`.
///
/// Deterministic given identical scores: ties keep the first-seen candidate,
/// and the final sort is stable with respect to insertion order.
pub fn rank(candidates: Vec<Track>, target_count: usize, profile: &StyleProfile) -> Vec<Track> {
    let total = candidates.len();

    // Dedup: first occurrence claims the slot, a strictly greater score
    // replaces it in place so insertion order stays stable.
    let mut slots: Vec<Track> = Vec::new();
    let mut by_identity: HashMap<TrackIdentity, usize> = HashMap::new();

    for track in candidates {
        match by_identity.get(&track.identity()) {
            Some(&idx) => {
                if track.style_score > slots[idx].style_score {
                    slots[idx] = track;
                }
            }
            None => {
                by_identity.insert(track.identity(), slots.len());
                slots.push(track);
            }
        }
    }

    // Tempo partition: unknown passes through, out-of-range is dropped,
    // acceptable is penalized exactly once.
    let mut kept: Vec<Track> = Vec::new();
    for mut track in slots {
        match profile.tempo_fit(track.bpm) {
            TempoFit::Ideal | TempoFit::Unknown => kept.push(track),
            TempoFit::Acceptable => {
                track.style_score *= profile.tempo_penalty;
                kept.push(track);
            }
            TempoFit::Out => {
                debug!(
                    track = %track.display_name(),
                    bpm = ?track.bpm,
                    "dropping track outside acceptable tempo range"
                );
            }
        }
    }

    kept.sort_by(|a, b| {
        b.style_score
            .total_cmp(&a.style_score)
            .then(b.popularity.total_cmp(&a.popularity))
    });
    kept.truncate(target_count);

    debug!(
        candidates = total,
        unique = by_identity.len(),
        ranked = kept.len(),
        "ranking complete"
    );

    kept
}
