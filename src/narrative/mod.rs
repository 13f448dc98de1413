//! Playlist description generation.
//!
//! Optional collaborator: anything that can turn a ranked track list into a
//! few sentences of liner notes. The template implementation is
//! deterministic and doubles as the stub for tests and offline runs.

use crate::track::Track;

/// Produces a human-readable description for an exported playlist.
pub trait NarrativeGenerator: Send + Sync {
    fn describe(&self, tracks: &[Track], playlist_name: &str) -> String;
}

/// Deterministic description built from track statistics.
pub struct TemplateNarrator;

impl NarrativeGenerator for TemplateNarrator {
    fn describe(&self, tracks: &[Track], playlist_name: &str) -> String {
        if tracks.is_empty() {
            return format!("{}: an empty crate, for now.", playlist_name);
        }

        let bpms: Vec<u32> = tracks.iter().filter_map(|t| t.bpm).collect();
        let bpm_blurb = if bpms.is_empty() {
            String::new()
        } else {
            let min = bpms.iter().min().unwrap();
            let max = bpms.iter().max().unwrap();
            if min == max {
                format!(" locked at {} BPM", min)
            } else {
                format!(" moving between {} and {} BPM", min, max)
            }
        };

        let mut labels: Vec<&str> = tracks.iter().filter_map(|t| t.label.as_deref()).collect();
        labels.sort_unstable();
        labels.dedup();
        let label_blurb = match labels.len() {
            0 => String::new(),
            1 => format!(" Sounds courtesy of {}.", labels[0]),
            n => format!(" Pulled from {} labels including {}.", n, labels[0]),
        };

        format!(
            "{}: {} tracks of house-leaning selections{}.{}",
            playlist_name,
            tracks.len(),
            bpm_blurb,
            label_blurb
        )
    }
}
