//! AI scout for similar-artist discovery.
//!
//! Talks to a chat-completions style API and extracts track mentions from
//! the free-text answer with a best-effort parser. Every extracted item
//! carries a confidence score; low-confidence extractions are dropped here
//! and everything that survives is treated downstream exactly like output
//! from any other noisy source.

use super::ArtistScout;
use crate::config::{DiscoverySettings, PacingSettings, ScoutSettings};
use crate::pacing::Pacer;
use crate::style::StyleProfile;
use crate::track::{Track, TrackSource};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a music discovery expert specializing in \
electronic music. Provide accurate, current information about artists, tracks, \
and the electronic music scene. List concrete tracks as `Artist - \"Title\"`.";

/// One extracted mention from scout free text.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoutMention {
    pub artist: String,
    pub title: Option<String>,
    pub genre: Option<String>,
    pub label: Option<String>,
    /// Parser confidence in [0, 1].
    pub confidence: f64,
}

/// Chat-completions client used for artist scouting.
pub struct ScoutClient {
    client: reqwest::Client,
    settings: ScoutSettings,
    profile: StyleProfile,
    min_confidence: f64,
    pacer: Pacer,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ScoutClient {
    pub fn new(
        settings: &ScoutSettings,
        discovery: &DiscoverySettings,
        pacing: &PacingSettings,
        profile: StyleProfile,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build scout HTTP client")?;

        Ok(Self {
            client,
            settings: settings.clone(),
            profile,
            min_confidence: discovery.min_scout_confidence,
            pacer: Pacer::from_millis(pacing.scout_interval_ms),
        })
    }

    fn build_prompt(&self, limit: usize) -> String {
        let artists = self
            .profile
            .similar_artists
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        let labels = self
            .profile
            .labels
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        let (lo, hi) = self.profile.tempo_range;

        format!(
            "Find current electronic music tracks by artists similar to {artists}. \
             Prefer releases on labels like {labels} and tracks in the {lo}-{hi} BPM range. \
             List up to {limit} tracks, one per line, as `Artist - \"Title\"`, optionally \
             followed by indented `Genre:` or `Label:` lines."
        )
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let Some(api_key) = &self.settings.api_key else {
            bail!("no scout API key configured");
        };

        self.pacer.pace().await;

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            max_tokens: self.settings.max_tokens,
            temperature: 0.3,
        };

        let url = format!("{}/chat/completions", self.settings.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach scout API")?;

        if !response.status().is_success() {
            bail!("Scout API failed with status {}", response.status());
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse scout response")?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("Scout response contained no choices")
    }
}

#[async_trait]
impl ArtistScout for ScoutClient {
    async fn similar_artist_tracks(&self, limit: usize) -> Result<Vec<Track>> {
        let content = self.complete(self.build_prompt(limit)).await?;
        let mentions = parse_track_mentions(&content);
        Ok(mentions_to_tracks(mentions, self.min_confidence, limit))
    }
}

/// Extract track mentions from free text.
///
/// Heuristics, not a grammar: numbered or bulleted lines become mentions,
/// `Genre:`/`Label:`/`Style:` continuation lines attach to the previous
/// mention. Confidence reflects how track-shaped the line looked.
pub fn parse_track_mentions(content: &str) -> Vec<ScoutMention> {
    // Safe: patterns are literals, tested below.
    let item_re = Regex::new(r"^\s*(?:\d+[.)]\s+|[-*•]\s+)(.+)$").unwrap();
    let attr_re = Regex::new(r"(?i)^\s*(genre|style|label|record label)\s*:\s*(.+)$").unwrap();
    let separator_re = Regex::new(r"\s+[-–—]\s+").unwrap();

    let mut mentions: Vec<ScoutMention> = Vec::new();

    for line in content.lines() {
        if let Some(caps) = attr_re.captures(line) {
            if let Some(last) = mentions.last_mut() {
                let value = caps[2].trim().to_string();
                match caps[1].to_lowercase().as_str() {
                    "genre" | "style" => last.genre = Some(value),
                    _ => last.label = Some(value),
                }
            }
            continue;
        }

        let Some(caps) = item_re.captures(line) else {
            continue;
        };
        let body = strip_markdown(caps[1].trim());
        if body.is_empty() {
            continue;
        }

        let mut confidence: f64 = 0.4;
        let (artist, title) = match separator_re.splitn(&body, 2).collect::<Vec<_>>()[..] {
            [artist, title] => {
                confidence += 0.3;
                let (title, was_quoted) = strip_quotes(title.trim());
                if was_quoted {
                    confidence += 0.2;
                }
                (artist.trim().to_string(), Some(title))
            }
            _ => (body.clone(), None),
        };

        // A plausible artist name, not a sentence fragment.
        if (3..=48).contains(&artist.len()) {
            confidence += 0.1;
        }

        if artist.len() < 2 {
            continue;
        }

        mentions.push(ScoutMention {
            artist,
            title: title.filter(|t| !t.is_empty()),
            genre: None,
            label: None,
            confidence: confidence.min(1.0),
        });
    }

    mentions
}

/// Turn mentions into track records, dropping titleless or low-confidence
/// extractions.
fn mentions_to_tracks(mentions: Vec<ScoutMention>, min_confidence: f64, limit: usize) -> Vec<Track> {
    mentions
        .into_iter()
        .filter(|m| m.confidence >= min_confidence)
        .filter_map(|m| {
            let title = m.title?;
            let mut track = Track::new(m.artist, title, TrackSource::Scout);
            track.genre = m.genre;
            track.label = m.label;
            track
                .extras
                .insert("scout_confidence".to_string(), format!("{:.2}", m.confidence));
            Some(track)
        })
        .take(limit)
        .collect()
}

fn strip_markdown(s: &str) -> String {
    s.replace("**", "").replace('`', "").trim().to_string()
}

fn strip_quotes(s: &str) -> (String, bool) {
    let trimmed = s.trim();
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\'')] {
        if trimmed.len() >= 2 && trimmed.starts_with(open) && trimmed.ends_with(close) {
            return (trimmed[open.len_utf8()..trimmed.len() - close.len_utf8()].to_string(), true);
        }
    }
    (trimmed.to_string(), false)
}
