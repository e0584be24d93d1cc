//! Spotify Web API access: listening history, audio features and OAuth.

mod client;
mod models;
mod oauth;

pub use client::SpotifyClient;
pub use models::{
    ArtistRef, AudioFeatures, PlayHistoryItem, PlayedTrack, SpotifyUser, TokenInfo, TrackFeature,
};
pub use oauth::SpotifyOAuth;

use crate::error::Result;
use async_trait::async_trait;

/// Source of the user's recent listening, merged with audio descriptors.
#[async_trait]
pub trait AudioFeatureSource: Send + Sync {
    /// Recently played tracks with their audio features.
    async fn recent_track_features(&self) -> Result<Vec<TrackFeature>>;
}
