//! M3U playlist and track-list sheet generation.
//!
//! Both are companions to the XML manifest: the M3U as a lowest-common-
//! denominator fallback other players read, the text sheet for a human
//! re-buying tracks properly later.

use super::StagedTrack;
use std::fmt::Write as _;

/// Render an extended M3U playlist.
pub fn generate_m3u(staged: &[StagedTrack], playlist_name: &str) -> String {
    let mut m3u = String::from("#EXTM3U\n");
    let _ = writeln!(m3u, "#PLAYLIST:{}", playlist_name);

    for item in staged {
        let _ = writeln!(
            m3u,
            "#EXTINF:300,{} - {}",
            item.track.artist, item.track.title
        );
        let _ = writeln!(m3u, "{}", item.path.display());
    }

    m3u
}

/// Render the human-readable track list sheet.
pub fn generate_track_list(staged: &[StagedTrack], playlist_name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Playlist: {}", playlist_name);
    let _ = writeln!(
        out,
        "Generated: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "Total Tracks: {}", staged.len());
    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");

    for (i, item) in staged.iter().enumerate() {
        let track = &item.track;
        let _ = writeln!(out, "{:2}. {} - {}", i + 1, track.artist, track.title);

        let mut details: Vec<String> = Vec::new();
        if let Some(bpm) = track.bpm {
            details.push(format!("BPM: {}", bpm));
        }
        if let Some(key) = &track.key {
            details.push(format!("Key: {}", key));
        }
        if let Some(label) = &track.label {
            details.push(format!("Label: {}", label));
        }
        if !details.is_empty() {
            let _ = writeln!(out, "    {}", details.join(" | "));
        }
        if let Some(url) = &track.storefront_url {
            let _ = writeln!(out, "    Store: {}", url);
        }
        out.push('\n');
    }

    out.push_str(&"=".repeat(50));
    out.push('\n');
    out.push_str("Files are staged under Music/; import the rekordbox.xml\n");
    out.push_str("from PIONEER/rekordbox into Rekordbox, then sync to USB.\n");

    out
}
