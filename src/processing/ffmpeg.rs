//! ffprobe/ffmpeg subprocess wrappers.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::ProcessingError;

/// Audio properties extracted from ffprobe.
#[derive(Debug, Clone)]
pub struct AudioMetadata {
    /// Duration in milliseconds.
    pub duration_ms: i64,
    /// Audio codec name.
    pub codec: String,
    /// Bitrate in kbps.
    pub bitrate: Option<i32>,
    /// Sample rate in Hz.
    pub sample_rate: Option<i32>,
    /// Number of channels.
    pub channels: Option<i32>,
    /// Container format name (e.g., "mp3", "flac").
    pub format: String,
}

/// ffprobe JSON output structure.
#[derive(Debug, Deserialize)]
pub(super) struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: String,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<i32>,
    bit_rate: Option<String>,
}

pub(super) fn parse_probe_output(json: &str) -> Result<AudioMetadata, ProcessingError> {
    let probe: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| ProcessingError::ProbeFailed(format!("JSON parse error: {}", e)))?;

    let audio_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .ok_or_else(|| ProcessingError::ProbeFailed("No audio stream found".to_string()))?;

    let duration_secs: f64 = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse().ok())
        .unwrap_or(0.0);

    // Prefer the stream bitrate, fall back to the container's.
    let bitrate_str = audio_stream
        .bit_rate
        .as_ref()
        .or(probe.format.bit_rate.as_ref());
    let bitrate = bitrate_str
        .and_then(|b| b.parse::<i64>().ok())
        .map(|b| (b / 1000) as i32);

    let sample_rate = audio_stream
        .sample_rate
        .as_ref()
        .and_then(|sr| sr.parse().ok());

    Ok(AudioMetadata {
        duration_ms: (duration_secs * 1000.0) as i64,
        codec: audio_stream
            .codec_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        bitrate,
        sample_rate,
        channels: audio_stream.channels,
        format: probe.format.format_name,
    })
}

/// Probe an audio file for codec, bitrate, and duration.
pub async fn probe_audio_file(path: &Path) -> Result<AudioMetadata, ProcessingError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProcessingError::ProbeFailed(stderr.to_string()));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Re-encode to MP3 at the target bitrate/sample rate while embedding tags.
pub async fn convert_to_mp3(
    input_path: &Path,
    output_path: &Path,
    bitrate_kbps: u32,
    sample_rate_hz: u32,
    metadata_args: &[String],
) -> Result<(), ProcessingError> {
    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(input_path)
        .args([
            "-codec:a",
            "libmp3lame",
            "-b:a",
            &format!("{}k", bitrate_kbps),
            "-ar",
            &sample_rate_hz.to_string(),
            "-ac",
            "2",
        ])
        .args(metadata_args)
        .args(["-id3v2_version", "3", "-y"])
        .arg(output_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProcessingError::ConversionFailed(stderr.to_string()));
    }

    Ok(())
}

/// Remux without re-encoding (already at target quality), embedding tags.
pub async fn remux_with_tags(
    input_path: &Path,
    output_path: &Path,
    metadata_args: &[String],
) -> Result<(), ProcessingError> {
    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(input_path)
        .args(["-c:a", "copy"])
        .args(metadata_args)
        .args(["-id3v2_version", "3", "-y"])
        .arg(output_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProcessingError::ConversionFailed(stderr.to_string()));
    }

    Ok(())
}

/// Check whether a tool (ffmpeg/ffprobe) responds to `-version`.
pub async fn tool_available(bin: &str) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "format": {
            "format_name": "mp3",
            "duration": "215.3",
            "bit_rate": "320000"
        },
        "streams": [
            {
                "codec_type": "audio",
                "codec_name": "mp3",
                "sample_rate": "44100",
                "channels": 2,
                "bit_rate": "320000"
            }
        ]
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let meta = parse_probe_output(PROBE_JSON).unwrap();
        assert_eq!(meta.duration_ms, 215300);
        assert_eq!(meta.codec, "mp3");
        assert_eq!(meta.bitrate, Some(320));
        assert_eq!(meta.sample_rate, Some(44100));
        assert_eq!(meta.channels, Some(2));
        assert_eq!(meta.format, "mp3");
    }

    #[test]
    fn test_parse_probe_output_no_audio_stream() {
        let json = r#"{
            "format": {"format_name": "mp4"},
            "streams": [{"codec_type": "video"}]
        }"#;
        let err = parse_probe_output(json).unwrap_err();
        assert!(matches!(err, ProcessingError::ProbeFailed(_)));
    }

    #[test]
    fn test_parse_probe_output_falls_back_to_format_bitrate() {
        let json = r#"{
            "format": {"format_name": "mp3", "duration": "60.0", "bit_rate": "192000"},
            "streams": [{"codec_type": "audio", "codec_name": "mp3"}]
        }"#;
        let meta = parse_probe_output(json).unwrap();
        assert_eq!(meta.bitrate, Some(192));
    }

    #[test]
    fn test_parse_probe_output_invalid_json() {
        assert!(matches!(
            parse_probe_output("not json"),
            Err(ProcessingError::ProbeFailed(_))
        ));
    }
}
