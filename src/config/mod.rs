mod file_config;

pub use file_config::{
    AudioConfig, DiscoveryConfig, FileConfig, PacingConfig, ScoutConfig, StorefrontConfig,
};

use crate::style::StyleProfile;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Environment variable consulted when no storefront API key is configured.
pub const STOREFRONT_KEY_ENV: &str = "STOREFRONT_API_KEY";
/// Environment variable consulted when no scout API key is configured.
pub const SCOUT_KEY_ENV: &str = "SCOUT_API_KEY";

/// CLI arguments that participate in config resolution.
/// Mirrors the CLI flags that a TOML config file can override.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub storefront_api_key: Option<String>,
    pub scout_api_key: Option<String>,
    pub ripper_bin: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory for the database, download cache, and export bundle.
    pub data_dir: PathBuf,
    /// Default playlist name stem for exports.
    pub playlist_name: String,
    /// yt-dlp binary (name or path) for the ripper fallback.
    pub ripper_bin: String,

    pub audio: AudioSettings,
    pub pacing: PacingSettings,
    pub storefront: StorefrontSettings,
    pub scout: ScoutSettings,
    pub discovery: DiscoverySettings,
    pub profile: StyleProfile,
}

#[derive(Debug, Clone)]
pub struct AudioSettings {
    pub target_bitrate_kbps: u32,
    pub target_sample_rate_hz: u32,
    /// Processed files shorter than this are rejected as truncated rips.
    pub min_duration_secs: u32,
    pub min_file_bytes: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            target_bitrate_kbps: 320,
            target_sample_rate_hz: 44100,
            min_duration_secs: 30,
            min_file_bytes: 1000,
        }
    }
}

/// Minimum spacing between consecutive calls to each external collaborator.
#[derive(Debug, Clone)]
pub struct PacingSettings {
    pub storefront_interval_ms: u64,
    pub scout_interval_ms: u64,
    pub ripper_interval_ms: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            storefront_interval_ms: 1000,
            scout_interval_ms: 1000,
            ripper_interval_ms: 2000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorefrontSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StorefrontSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.beatport.com/v4".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoutSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ScoutSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.perplexity.ai".to_string(),
            model: "sonar".to_string(),
            api_key: None,
            max_tokens: 2000,
            timeout_secs: 30,
        }
    }
}

/// Fan-out widths for one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub scout_artist_limit: usize,
    pub labels_to_search: usize,
    pub label_limit: usize,
    pub chart_limit: usize,
    pub artists_to_search: usize,
    pub artist_limit: usize,
    /// Scout-parsed items below this confidence are discarded.
    pub min_scout_confidence: f64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            scout_artist_limit: 15,
            labels_to_search: 3,
            label_limit: 10,
            chart_limit: 15,
            artists_to_search: 5,
            artist_limit: 8,
            min_scout_confidence: 0.3,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present; API keys fall
    /// back to environment variables.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from("data"));

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;
        if !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let playlist_name = file
            .playlist_name
            .unwrap_or_else(|| "Crate Digs".to_string());

        let ripper_bin = file
            .ripper_bin
            .or_else(|| cli.ripper_bin.clone())
            .unwrap_or_else(|| "yt-dlp".to_string());

        let audio_file = file.audio.unwrap_or_default();
        let audio_defaults = AudioSettings::default();
        let audio = AudioSettings {
            target_bitrate_kbps: audio_file
                .target_bitrate_kbps
                .unwrap_or(audio_defaults.target_bitrate_kbps),
            target_sample_rate_hz: audio_file
                .target_sample_rate_hz
                .unwrap_or(audio_defaults.target_sample_rate_hz),
            min_duration_secs: audio_file
                .min_duration_secs
                .unwrap_or(audio_defaults.min_duration_secs),
            min_file_bytes: audio_file
                .min_file_bytes
                .unwrap_or(audio_defaults.min_file_bytes),
        };

        let pacing_file = file.pacing.unwrap_or_default();
        let pacing_defaults = PacingSettings::default();
        let pacing = PacingSettings {
            storefront_interval_ms: pacing_file
                .storefront_interval_ms
                .unwrap_or(pacing_defaults.storefront_interval_ms),
            scout_interval_ms: pacing_file
                .scout_interval_ms
                .unwrap_or(pacing_defaults.scout_interval_ms),
            ripper_interval_ms: pacing_file
                .ripper_interval_ms
                .unwrap_or(pacing_defaults.ripper_interval_ms),
        };

        let sf_file = file.storefront.unwrap_or_default();
        let sf_defaults = StorefrontSettings::default();
        let storefront = StorefrontSettings {
            base_url: sf_file
                .base_url
                .unwrap_or(sf_defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            api_key: sf_file
                .api_key
                .or_else(|| cli.storefront_api_key.clone())
                .or_else(|| {
                    std::env::var(STOREFRONT_KEY_ENV)
                        .ok()
                        .filter(|k| !k.is_empty())
                }),
            timeout_secs: sf_file.timeout_secs.unwrap_or(sf_defaults.timeout_secs),
        };

        let scout_file = file.scout.unwrap_or_default();
        let scout_defaults = ScoutSettings::default();
        let scout = ScoutSettings {
            base_url: scout_file
                .base_url
                .unwrap_or(scout_defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            model: scout_file.model.unwrap_or(scout_defaults.model),
            api_key: scout_file
                .api_key
                .or_else(|| cli.scout_api_key.clone())
                .or_else(|| std::env::var(SCOUT_KEY_ENV).ok().filter(|k| !k.is_empty())),
            max_tokens: scout_file.max_tokens.unwrap_or(scout_defaults.max_tokens),
            timeout_secs: scout_file
                .timeout_secs
                .unwrap_or(scout_defaults.timeout_secs),
        };

        let disc_file = file.discovery.unwrap_or_default();
        let disc_defaults = DiscoverySettings::default();
        let discovery = DiscoverySettings {
            scout_artist_limit: disc_file
                .scout_artist_limit
                .unwrap_or(disc_defaults.scout_artist_limit),
            labels_to_search: disc_file
                .labels_to_search
                .unwrap_or(disc_defaults.labels_to_search),
            label_limit: disc_file.label_limit.unwrap_or(disc_defaults.label_limit),
            chart_limit: disc_file.chart_limit.unwrap_or(disc_defaults.chart_limit),
            artists_to_search: disc_file
                .artists_to_search
                .unwrap_or(disc_defaults.artists_to_search),
            artist_limit: disc_file.artist_limit.unwrap_or(disc_defaults.artist_limit),
            min_scout_confidence: disc_file
                .min_scout_confidence
                .unwrap_or(disc_defaults.min_scout_confidence),
        };

        let profile = file.profile.unwrap_or_default();
        if profile.tempo_range.0 > profile.tempo_range.1 {
            bail!(
                "Invalid tempo_range: {} > {}",
                profile.tempo_range.0,
                profile.tempo_range.1
            );
        }
        if profile.acceptable_tempo_range.0 > profile.tempo_range.0
            || profile.acceptable_tempo_range.1 < profile.tempo_range.1
        {
            bail!("acceptable_tempo_range must contain tempo_range");
        }
        if !(0.0..=1.0).contains(&profile.tempo_penalty) {
            bail!(
                "tempo_penalty must be in [0, 1], got {}",
                profile.tempo_penalty
            );
        }

        Ok(Self {
            data_dir,
            playlist_name,
            ripper_bin,
            audio,
            pacing,
            storefront,
            scout,
            discovery,
            profile,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("tracks.db")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn usb_dir(&self) -> PathBuf {
        self.data_dir.join("usb_export")
    }
}
