use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::style::StyleProfile;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub data_dir: Option<String>,
    pub playlist_name: Option<String>,
    pub ripper_bin: Option<String>,

    // Feature configs
    pub audio: Option<AudioConfig>,
    pub pacing: Option<PacingConfig>,
    pub storefront: Option<StorefrontConfig>,
    pub scout: Option<ScoutConfig>,
    pub discovery: Option<DiscoveryConfig>,

    /// Full style-profile override; absent sections fall back to the
    /// built-in tech house profile.
    pub profile: Option<StyleProfile>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AudioConfig {
    pub target_bitrate_kbps: Option<u32>,
    pub target_sample_rate_hz: Option<u32>,
    pub min_duration_secs: Option<u32>,
    pub min_file_bytes: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PacingConfig {
    pub storefront_interval_ms: Option<u64>,
    pub scout_interval_ms: Option<u64>,
    pub ripper_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StorefrontConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ScoutConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub scout_artist_limit: Option<usize>,
    pub labels_to_search: Option<usize>,
    pub label_limit: Option<usize>,
    pub chart_limit: Option<usize>,
    pub artists_to_search: Option<usize>,
    pub artist_limit: Option<usize>,
    pub min_scout_confidence: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
