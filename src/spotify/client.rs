//! Spotify Web API client bound to one user's access token.

use super::models::{
    AudioFeatures, AudioFeaturesResponse, PlayHistoryItem, RecentlyPlayedResponse, SpotifyUser,
    TrackFeature,
};
use super::AudioFeatureSource;
use crate::config::SpotifySettings;
use crate::error::{MoodlistError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// The audio-features endpoint accepts at most this many ids per call.
const FEATURES_BATCH_SIZE: usize = 100;

/// Client for the Spotify Web API.
pub struct SpotifyClient {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
    recent_limit: u32,
    lookback: chrono::Duration,
}

impl SpotifyClient {
    /// Create a client for the given access token.
    ///
    /// Fails immediately when the token is missing.
    pub fn new(access_token: &str, settings: &SpotifySettings) -> Result<Self> {
        if access_token.trim().is_empty() {
            return Err(MoodlistError::MissingCredential(
                "Please set a Spotify access token".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            recent_limit: settings.recent_limit,
            lookback: chrono::Duration::days(settings.lookback_days),
        })
    }

    /// Fetch the profile of the token's owner.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<SpotifyUser> {
        self.get_json("/me", &[]).await
    }

    /// Fetch up to `limit` plays that happened after `after`.
    #[instrument(skip(self))]
    pub async fn recently_played(
        &self,
        limit: u32,
        after: DateTime<Utc>,
    ) -> Result<Vec<PlayHistoryItem>> {
        let query = [
            ("limit", limit.min(50).to_string()),
            ("after", after.timestamp_millis().to_string()),
        ];
        let response: RecentlyPlayedResponse =
            self.get_json("/me/player/recently-played", &query).await?;
        Ok(response.items)
    }

    /// Fetch audio features for the given track ids, keyed by id.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn audio_features(&self, ids: &[String]) -> Result<HashMap<String, AudioFeatures>> {
        let mut features = HashMap::with_capacity(ids.len());

        for batch in ids.chunks(FEATURES_BATCH_SIZE) {
            let query = [("ids", batch.join(","))];
            let response: AudioFeaturesResponse = self.get_json("/audio-features", &query).await?;

            for item in response.audio_features.into_iter().flatten() {
                features.insert(item.id.clone(), item);
            }
        }

        Ok(features)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.api_base, path);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MoodlistError::SpotifyUnauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MoodlistError::Spotify(format!(
                "{} returned {}: {}",
                path,
                status,
                body.chars().take(300).collect::<String>()
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AudioFeatureSource for SpotifyClient {
    #[instrument(skip(self))]
    async fn recent_track_features(&self) -> Result<Vec<TrackFeature>> {
        let after = Utc::now() - self.lookback;
        let plays = self.recently_played(self.recent_limit, after).await?;

        // One entry per track, in order of first play
        let mut seen = HashSet::new();
        let tracks: Vec<_> = plays
            .into_iter()
            .filter_map(|item| {
                let id = item.track.id.clone()?;
                seen.insert(id).then_some(item.track)
            })
            .collect();

        if tracks.is_empty() {
            info!("No recent plays in the lookback window");
            return Ok(Vec::new());
        }

        let ids: Vec<String> = tracks.iter().filter_map(|t| t.id.clone()).collect();
        let mut features = self.audio_features(&ids).await?;

        let merged: Vec<TrackFeature> = tracks
            .iter()
            .filter_map(|track| {
                let id = track.id.as_deref()?;
                match features.remove(id) {
                    Some(f) => Some(TrackFeature::new(track, f)),
                    None => {
                        warn!("No audio features for track {} ({})", track.name, id);
                        None
                    }
                }
            })
            .collect();

        info!("Fetched audio features for {} recent tracks", merged.len());
        Ok(merged)
    }
}
