//! HTTP client for the storefront catalog API.
//!
//! Implements the label/chart/artist searches and the secondary metadata
//! lookup used for enrichment. Works with or without an API key; paced
//! between requests to stay under the service's throttling radar.

use super::{CatalogSearch, MetadataEnricher};
use crate::config::{PacingSettings, StorefrontSettings};
use crate::pacing::Pacer;
use crate::track::{Track, TrackSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// HTTP client for the storefront catalog.
pub struct StorefrontClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    pacer: Pacer,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Vec<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    name: Option<String>,
    #[serde(default)]
    artists: Vec<ApiNamed>,
    bpm: Option<u32>,
    key: Option<ApiNamed>,
    genre: Option<ApiNamed>,
    label: Option<ApiNamed>,
    date: Option<ApiDate>,
    id: Option<serde_json::Value>,
    url: Option<String>,
    download_url: Option<String>,
    chart_position: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiNamed {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiDate {
    released: Option<String>,
}

impl StorefrontClient {
    pub fn new(settings: &StorefrontSettings, pacing: &PacingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build storefront HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            pacer: Pacer::from_millis(pacing.storefront_interval_ms),
        })
    }

    /// Issue a catalog search and convert the results.
    async fn search(&self, query: &str, limit: usize, source: TrackSource) -> Result<Vec<Track>> {
        self.pacer.pace().await;

        let url = format!(
            "{}/catalog/search?q={}&type=tracks&per_page={}",
            self.base_url,
            urlencoding::encode(query),
            limit
        );

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach storefront catalog")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Storefront search failed with status {}",
                response.status()
            );
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("Failed to parse storefront search response")?;

        Ok(body
            .tracks
            .into_iter()
            .filter_map(|t| convert_track(t, source))
            .take(limit)
            .collect())
    }
}

/// Convert an API track into the internal record; tracks without a usable
/// name or artist are dropped.
fn convert_track(api: ApiTrack, source: TrackSource) -> Option<Track> {
    let title = api.name.filter(|n| !n.trim().is_empty())?;
    let artist = {
        let names: Vec<String> = api
            .artists
            .into_iter()
            .filter_map(|a| a.name)
            .filter(|n| !n.trim().is_empty())
            .collect();
        if names.is_empty() {
            return None;
        }
        names.join(", ")
    };

    let popularity = match api.chart_position {
        // Chart rank 1 → 1.0, decaying linearly, floored at 0.1.
        Some(pos) => (1.0 - (pos.saturating_sub(1) as f64) / 100.0).max(0.1),
        None => 0.5,
    };

    let mut track = Track::new(artist, title, source);
    track.bpm = api.bpm;
    track.key = api.key.and_then(|k| k.name);
    track.genre = api.genre.and_then(|g| g.name);
    track.label = api.label.and_then(|l| l.name);
    track.release_date = api.date.and_then(|d| d.released);
    track.storefront_id = api.id.map(|v| match v {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    });
    track.storefront_url = api.url;
    track.download_url = api.download_url;
    track.popularity = popularity;
    Some(track)
}

/// Normalize a name for best-match comparison.
fn normalize(s: &str) -> String {
    s.trim().to_lowercase().replace('&', "and")
}

#[async_trait]
impl CatalogSearch for StorefrontClient {
    async fn label_releases(&self, label: &str, limit: usize) -> Result<Vec<Track>> {
        self.search(&format!("label:{}", label), limit, TrackSource::LabelSearch)
            .await
    }

    async fn genre_charts(&self, genre: &str, limit: usize) -> Result<Vec<Track>> {
        self.pacer.pace().await;

        let url = format!(
            "{}/catalog/charts/{}?per_page={}",
            self.base_url,
            urlencoding::encode(genre),
            limit
        );

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach storefront charts")?;

        if !response.status().is_success() {
            anyhow::bail!("Chart lookup failed with status {}", response.status());
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("Failed to parse chart response")?;

        // Position may be implicit in list order when the API omits it.
        Ok(body
            .tracks
            .into_iter()
            .enumerate()
            .filter_map(|(i, mut t)| {
                if t.chart_position.is_none() {
                    t.chart_position = Some(i as u32 + 1);
                }
                convert_track(t, TrackSource::StorefrontCharts)
            })
            .take(limit)
            .collect())
    }

    async fn artist_tracks(&self, artist: &str, limit: usize) -> Result<Vec<Track>> {
        self.search(
            &format!("artist:{}", artist),
            limit,
            TrackSource::ArtistSearch,
        )
        .await
    }
}

#[async_trait]
impl MetadataEnricher for StorefrontClient {
    async fn enrich(&self, track: &Track) -> Result<Track> {
        let query = format!("{} {}", track.artist, track.title);
        let results = self.search(&query, 5, track.source).await?;

        let best = results.into_iter().find(|candidate| {
            normalize(&candidate.artist) == normalize(&track.artist)
                && normalize(&candidate.title) == normalize(&track.title)
        });

        let mut enriched = track.clone();
        if let Some(found) = best {
            enriched.merge_missing_from(&found);
            if found.popularity > enriched.popularity {
                enriched.popularity = found.popularity;
            }
        }
        Ok(enriched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_api_track(name: &str, artist: &str) -> ApiTrack {
        ApiTrack {
            name: Some(name.to_string()),
            artists: vec![ApiNamed {
                name: Some(artist.to_string()),
            }],
            bpm: Some(126),
            key: Some(ApiNamed {
                name: Some("A min".to_string()),
            }),
            genre: Some(ApiNamed {
                name: Some("Tech House".to_string()),
            }),
            label: Some(ApiNamed {
                name: Some("Good Good Records".to_string()),
            }),
            date: Some(ApiDate {
                released: Some("2025-11-07".to_string()),
            }),
            id: Some(serde_json::Value::from(12345)),
            url: Some("https://store.example/track/12345".to_string()),
            download_url: None,
            chart_position: None,
        }
    }

    #[test]
    fn test_convert_track_full() {
        let track = convert_track(
            make_api_track("Deep End", "GUDFELLA"),
            TrackSource::StorefrontApi,
        )
        .unwrap();

        assert_eq!(track.title, "Deep End");
        assert_eq!(track.artist, "GUDFELLA");
        assert_eq!(track.bpm, Some(126));
        assert_eq!(track.key.as_deref(), Some("A min"));
        assert_eq!(track.genre.as_deref(), Some("Tech House"));
        assert_eq!(track.storefront_id.as_deref(), Some("12345"));
        assert_eq!(track.popularity, 0.5);
    }

    #[test]
    fn test_convert_track_joins_multiple_artists() {
        let mut api = make_api_track("Collab", "One");
        api.artists.push(ApiNamed {
            name: Some("Two".to_string()),
        });

        let track = convert_track(api, TrackSource::StorefrontApi).unwrap();
        assert_eq!(track.artist, "One, Two");
    }

    #[test]
    fn test_convert_track_requires_name_and_artist() {
        let mut no_name = make_api_track("", "Somebody");
        no_name.name = Some("  ".to_string());
        assert!(convert_track(no_name, TrackSource::StorefrontApi).is_none());

        let mut no_artist = make_api_track("Track", "x");
        no_artist.artists.clear();
        assert!(convert_track(no_artist, TrackSource::StorefrontApi).is_none());
    }

    #[test]
    fn test_chart_position_maps_to_popularity() {
        let mut top = make_api_track("Number One", "a");
        top.chart_position = Some(1);
        assert_eq!(
            convert_track(top, TrackSource::StorefrontCharts)
                .unwrap()
                .popularity,
            1.0
        );

        let mut deep = make_api_track("Deep Cut", "b");
        deep.chart_position = Some(100);
        let popularity = convert_track(deep, TrackSource::StorefrontCharts)
            .unwrap()
            .popularity;
        assert!((popularity - 0.1).abs() < 1e-9);

        let mut very_deep = make_api_track("Obscure", "c");
        very_deep.chart_position = Some(500);
        assert_eq!(
            convert_track(very_deep, TrackSource::StorefrontCharts)
                .unwrap()
                .popularity,
            0.1
        );
    }

    #[test]
    fn test_normalize_for_matching() {
        assert_eq!(normalize(" Tita & Friends "), "tita and friends");
        assert_eq!(normalize("TITA and FRIENDS"), "tita and friends");
    }

    #[test]
    fn test_search_response_tolerates_missing_tracks_field() {
        let body: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(body.tracks.is_empty());
    }
}
