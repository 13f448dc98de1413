//! Track discovery.
//!
//! Fans out a fixed set of queries to independent sources (AI scout,
//! storefront label/chart/artist searches), scores and enriches every
//! candidate, persists the whole pool, and hands it to the ranker. A source
//! failing or coming back empty never aborts the run; it just contributes
//! nothing.

pub mod scout;
pub mod storefront;

pub use scout::ScoutClient;
pub use storefront::StorefrontClient;

use crate::config::DiscoverySettings;
use crate::ranking;
use crate::store::TrackStore;
use crate::style::{self, StyleProfile};
use crate::track::Track;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// AI-backed similar-artist discovery.
///
/// Returns loosely-populated tracks extracted from free text; output is
/// noisy by nature and gets no more trust than any other source.
#[async_trait]
pub trait ArtistScout: Send + Sync {
    async fn similar_artist_tracks(&self, limit: usize) -> Result<Vec<Track>>;
}

/// Storefront catalog searches.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn label_releases(&self, label: &str, limit: usize) -> Result<Vec<Track>>;
    async fn genre_charts(&self, genre: &str, limit: usize) -> Result<Vec<Track>>;
    async fn artist_tracks(&self, artist: &str, limit: usize) -> Result<Vec<Track>>;
}

/// Secondary metadata lookup.
///
/// `enrich` returns a copy with additional fields filled where available
/// and must be a no-op on an already-complete track.
#[async_trait]
pub trait MetadataEnricher: Send + Sync {
    async fn enrich(&self, track: &Track) -> Result<Track>;
}

/// Result of one discovery run.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    /// Deduplicated, ranked tracks, at most the requested target count.
    pub tracks: Vec<Track>,
    /// Candidates seen across all sources before dedup.
    pub candidates_seen: usize,
    /// Non-fatal per-source and per-candidate failures.
    pub errors: Vec<String>,
}

/// Fan-out discovery coordinator.
pub struct DiscoveryOrchestrator {
    scout: Arc<dyn ArtistScout>,
    catalog: Arc<dyn CatalogSearch>,
    enricher: Arc<dyn MetadataEnricher>,
    store: Arc<dyn TrackStore>,
    profile: StyleProfile,
    settings: DiscoverySettings,
}

impl DiscoveryOrchestrator {
    pub fn new(
        scout: Arc<dyn ArtistScout>,
        catalog: Arc<dyn CatalogSearch>,
        enricher: Arc<dyn MetadataEnricher>,
        store: Arc<dyn TrackStore>,
        profile: StyleProfile,
        settings: DiscoverySettings,
    ) -> Self {
        Self {
            scout,
            catalog,
            enricher,
            store,
            profile,
            settings,
        }
    }

    /// Run the full discovery fan-out and return the ranked top
    /// `target_count` tracks.
    ///
    /// All sources failing yields an empty outcome, not an error. Every
    /// candidate is upserted into the store exactly once, whether or not it
    /// survives ranking.
    pub async fn discover(&self, target_count: usize) -> Result<DiscoveryOutcome> {
        let mut pool: Vec<Track> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        self.collect_scout(&mut pool, &mut errors).await;
        self.collect_labels(&mut pool, &mut errors).await;
        self.collect_charts(&mut pool, &mut errors).await;
        self.collect_artists(&mut pool, &mut errors).await;

        let candidates_seen = pool.len();
        info!(candidates = candidates_seen, "discovery fan-out complete");

        // Score, enrich where tempo/key is missing, re-score, persist.
        for track in pool.iter_mut() {
            track.style_score = style::score(track, &self.profile);

            if track.needs_enrichment() {
                match self.enricher.enrich(track).await {
                    Ok(enriched) => {
                        *track = enriched;
                        track.style_score = style::score(track, &self.profile);
                    }
                    Err(e) => {
                        warn!(track = %track.display_name(), error = %e, "enrichment failed");
                        errors.push(format!("enrich {}: {}", track.display_name(), e));
                    }
                }
            }

            match self.store.upsert_track(track) {
                Ok(id) => track.store_id = Some(id),
                Err(e) => {
                    warn!(track = %track.display_name(), error = %e, "failed to persist track");
                    errors.push(format!("persist {}: {}", track.display_name(), e));
                }
            }
        }

        let tracks = ranking::rank(pool, target_count, &self.profile);
        info!(ranked = tracks.len(), target = target_count, "discovery complete");

        Ok(DiscoveryOutcome {
            tracks,
            candidates_seen,
            errors,
        })
    }

    async fn collect_scout(&self, pool: &mut Vec<Track>, errors: &mut Vec<String>) {
        let limit = self.settings.scout_artist_limit;
        match self.scout.similar_artist_tracks(limit).await {
            Ok(tracks) => {
                info!(count = tracks.len(), "scout search returned");
                let _ = self
                    .store
                    .log_search("similar artists", "scout", tracks.len());
                pool.extend(tracks);
            }
            Err(e) => {
                warn!(error = %e, "scout search failed");
                errors.push(format!("scout: {}", e));
            }
        }
    }

    async fn collect_labels(&self, pool: &mut Vec<Track>, errors: &mut Vec<String>) {
        let labels: Vec<String> = self
            .profile
            .labels
            .iter()
            .take(self.settings.labels_to_search)
            .cloned()
            .collect();

        for label in labels {
            match self
                .catalog
                .label_releases(&label, self.settings.label_limit)
                .await
            {
                Ok(tracks) => {
                    info!(label = %label, count = tracks.len(), "label search returned");
                    let _ = self.store.log_search(&label, "label_search", tracks.len());
                    pool.extend(tracks);
                }
                Err(e) => {
                    warn!(label = %label, error = %e, "label search failed");
                    errors.push(format!("label {}: {}", label, e));
                }
            }
        }
    }

    async fn collect_charts(&self, pool: &mut Vec<Track>, errors: &mut Vec<String>) {
        let genre = self.profile.lead_genre_slug();
        match self
            .catalog
            .genre_charts(&genre, self.settings.chart_limit)
            .await
        {
            Ok(tracks) => {
                info!(genre = %genre, count = tracks.len(), "chart lookup returned");
                let _ = self
                    .store
                    .log_search(&genre, "storefront_charts", tracks.len());
                pool.extend(tracks);
            }
            Err(e) => {
                warn!(genre = %genre, error = %e, "chart lookup failed");
                errors.push(format!("charts {}: {}", genre, e));
            }
        }
    }

    async fn collect_artists(&self, pool: &mut Vec<Track>, errors: &mut Vec<String>) {
        let artists: Vec<String> = self
            .profile
            .similar_artists
            .iter()
            .take(self.settings.artists_to_search)
            .cloned()
            .collect();

        for artist in artists {
            match self
                .catalog
                .artist_tracks(&artist, self.settings.artist_limit)
                .await
            {
                Ok(tracks) => {
                    info!(artist = %artist, count = tracks.len(), "artist search returned");
                    let _ = self
                        .store
                        .log_search(&artist, "artist_search", tracks.len());
                    pool.extend(tracks);
                }
                Err(e) => {
                    warn!(artist = %artist, error = %e, "artist search failed");
                    errors.push(format!("artist {}: {}", artist, e));
                }
            }
        }
    }
}
