//! Rekordbox XML manifest generation and validation.
//!
//! The document shape follows what Rekordbox 6 accepts on import: a
//! DJ_PLAYLISTS root with a COLLECTION of TRACK entries plus a PLAYLISTS
//! tree referencing them by key. The writer is hand-rolled; the manifest is
//! write-mostly with a fixed schema, and validation only needs structural
//! checks.

use super::StagedTrack;
use std::fmt::Write as _;

/// Escape a string for use in an XML attribute value.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Render the full Rekordbox XML document for a playlist of staged tracks.
pub fn generate_xml(staged: &[StagedTrack], playlist_name: &str) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<DJ_PLAYLISTS Version=\"1.0.0\">\n");
    xml.push_str(
        "  <PRODUCT Name=\"rekordbox\" Version=\"6.0.0\" Company=\"Pioneer DJ\"/>\n",
    );

    let _ = writeln!(xml, "  <COLLECTION Entries=\"{}\">", staged.len());
    for (i, item) in staged.iter().enumerate() {
        write_track_element(&mut xml, item, i + 1);
    }
    xml.push_str("  </COLLECTION>\n");

    xml.push_str("  <PLAYLISTS>\n");
    xml.push_str("    <NODE Type=\"0\" Name=\"ROOT\" Count=\"1\">\n");
    let _ = writeln!(
        xml,
        "      <NODE Type=\"1\" Name=\"{}\" KeyType=\"0\" Entries=\"{}\">",
        xml_escape(playlist_name),
        staged.len()
    );
    for i in 0..staged.len() {
        let _ = writeln!(xml, "        <TRACK Key=\"{}\"/>", i + 1);
    }
    xml.push_str("      </NODE>\n");
    xml.push_str("    </NODE>\n");
    xml.push_str("  </PLAYLISTS>\n");
    xml.push_str("</DJ_PLAYLISTS>\n");

    xml
}

fn write_track_element(xml: &mut String, item: &StagedTrack, track_id: usize) {
    let track = &item.track;
    let location = format!(
        "file://localhost/{}",
        item.path.display().to_string().trim_start_matches('/')
    );
    let date_added = chrono::Local::now().format("%Y-%m-%d");

    let _ = writeln!(
        xml,
        "    <TRACK TrackID=\"{id}\" Name=\"{name}\" Artist=\"{artist}\" \
         Album=\"{album}\" Genre=\"{genre}\" Kind=\"MP3 File\" TotalTime=\"300\" \
         AverageBpm=\"{bpm}\" DateAdded=\"{date_added}\" BitRate=\"320\" \
         SampleRate=\"44100\" Tonality=\"{key}\" Label=\"{label}\" \
         Location=\"{location}\">",
        id = track_id,
        name = xml_escape(&track.title),
        artist = xml_escape(&track.artist),
        album = xml_escape(track.label.as_deref().unwrap_or("")),
        genre = xml_escape(track.genre.as_deref().unwrap_or("")),
        bpm = track.bpm.unwrap_or(120),
        date_added = date_added,
        key = xml_escape(track.key.as_deref().unwrap_or("")),
        label = xml_escape(track.label.as_deref().unwrap_or("")),
        location = xml_escape(&location),
    );

    if let Some(bpm) = track.bpm {
        let _ = writeln!(
            xml,
            "      <TEMPO Inizio=\"0.000\" Bpm=\"{}\" Metro=\"4/4\" Battito=\"1\"/>",
            bpm
        );
    }
    xml.push_str("      <POSITION_MARK Name=\"\" Type=\"0\" Start=\"0.000\" Num=\"-1\"/>\n");
    xml.push_str("    </TRACK>\n");
}

/// Structural validation result for a written manifest.
#[derive(Debug, Clone, Default)]
pub struct ManifestValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub track_count: usize,
    pub playlist_count: usize,
}

/// Structurally validate manifest content.
///
/// Checks the pieces the hardware import actually trips on: the root
/// element, a collection whose declared entry count matches the tracks
/// present, and at least one playlist node.
pub fn validate_xml_content(content: &str) -> ManifestValidation {
    let mut result = ManifestValidation {
        valid: true,
        ..Default::default()
    };

    if !content.contains("<DJ_PLAYLISTS") {
        result.errors.push("Root element should be DJ_PLAYLISTS".to_string());
        result.valid = false;
    }

    match extract_attr(content, "<COLLECTION", "Entries") {
        Some(declared) => {
            result.track_count = content.matches("<TRACK TrackID=").count();
            if declared.parse::<usize>().ok() != Some(result.track_count) {
                result.errors.push(format!(
                    "COLLECTION declares {} entries but contains {} tracks",
                    declared, result.track_count
                ));
                result.valid = false;
            }
        }
        None => {
            result.errors.push("Missing COLLECTION element".to_string());
            result.valid = false;
        }
    }

    result.playlist_count = content.matches("<NODE Type=\"1\"").count();
    if result.playlist_count == 0 {
        result.errors.push("No playlist nodes found".to_string());
        result.valid = false;
    }

    // The attribute pairs are adjacent in TRACK elements; matching the pair
    // avoids tripping on POSITION_MARK's always-empty Name.
    for (attr, message) in [
        ("Name=\"\" Artist=", "Track missing Name"),
        ("Artist=\"\" Album=", "Track missing Artist"),
    ] {
        let count = content.matches(attr).count();
        for _ in 0..count {
            result.warnings.push(message.to_string());
        }
    }

    result
}

/// Pull one attribute value out of the first occurrence of an element.
fn extract_attr(content: &str, element: &str, attr: &str) -> Option<String> {
    let start = content.find(element)?;
    let rest = &content[start..];
    let end = rest.find('>')?;
    let tag = &rest[..end];
    let needle = format!("{}=\"", attr);
    let attr_start = tag.find(&needle)? + needle.len();
    let attr_rest = &tag[attr_start..];
    let attr_end = attr_rest.find('"')?;
    Some(attr_rest[..attr_end].to_string())
}
