//! Spotify Web API payloads and the merged track feature record.

use serde::{Deserialize, Serialize};

/// The current user's profile (`GET /me`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

impl SpotifyUser {
    /// Name to greet the user with.
    pub fn greeting_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecentlyPlayedResponse {
    pub items: Vec<PlayHistoryItem>,
}

/// One entry of the user's listening history.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayHistoryItem {
    pub track: PlayedTrack,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayedTrack {
    /// Local files have no Spotify id.
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AudioFeaturesResponse {
    pub audio_features: Vec<Option<AudioFeatures>>,
}

/// Audio descriptors for one track. URL fields returned by the API are not kept.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    pub acousticness: f64,
    pub danceability: f64,
    pub duration_ms: u64,
    pub energy: f64,
    pub instrumentalness: f64,
    pub key: i32,
    pub liveness: f64,
    pub loudness: f64,
    pub mode: i32,
    pub speechiness: f64,
    pub tempo: f64,
    pub time_signature: i32,
    pub valence: f64,
}

/// A recently played track merged with its audio descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackFeature {
    pub id: String,
    pub song_name: String,
    /// Artist names joined with ", ".
    pub artists: String,
    pub acousticness: f64,
    pub danceability: f64,
    pub duration_ms: u64,
    pub energy: f64,
    pub instrumentalness: f64,
    pub key: i32,
    pub liveness: f64,
    pub loudness: f64,
    pub mode: i32,
    pub speechiness: f64,
    pub tempo: f64,
    pub time_signature: i32,
    pub valence: f64,
}

impl TrackFeature {
    pub fn new(track: &PlayedTrack, features: AudioFeatures) -> Self {
        let artists = track
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            id: features.id,
            song_name: track.name.clone(),
            artists,
            acousticness: features.acousticness,
            danceability: features.danceability,
            duration_ms: features.duration_ms,
            energy: features.energy,
            instrumentalness: features.instrumentalness,
            key: features.key,
            liveness: features.liveness,
            loudness: features.loudness,
            mode: features.mode,
            speechiness: features.speechiness,
            tempo: features.tempo,
            time_signature: features.time_signature,
            valence: features.valence,
        }
    }
}

/// Token returned by the authorization-code exchange.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_features_ignore_url_fields() {
        let json = serde_json::json!({
            "id": "4uLU6hMCjMI75M1A2tKUQC",
            "acousticness": 0.2,
            "danceability": 0.7,
            "duration_ms": 213573,
            "energy": 0.8,
            "instrumentalness": 0.0,
            "key": 8,
            "liveness": 0.1,
            "loudness": -5.5,
            "mode": 1,
            "speechiness": 0.04,
            "tempo": 113.0,
            "time_signature": 4,
            "valence": 0.9,
            "type": "audio_features",
            "uri": "spotify:track:4uLU6hMCjMI75M1A2tKUQC",
            "track_href": "https://api.spotify.com/v1/tracks/4uLU6hMCjMI75M1A2tKUQC",
            "analysis_url": "https://api.spotify.com/v1/audio-analysis/4uLU6hMCjMI75M1A2tKUQC"
        });
        let features: AudioFeatures = serde_json::from_value(json).unwrap();

        let track = PlayedTrack {
            id: Some(features.id.clone()),
            name: "Never Gonna Give You Up".to_string(),
            artists: vec![
                ArtistRef { name: "Rick Astley".to_string() },
                ArtistRef { name: "Someone Else".to_string() },
            ],
        };
        let merged = TrackFeature::new(&track, features);
        assert_eq!(merged.artists, "Rick Astley, Someone Else");

        let value = serde_json::to_value(&merged).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj["song_name"], "Never Gonna Give You Up");
        assert!(!obj.contains_key("uri"));
        assert!(!obj.contains_key("track_href"));
        assert!(!obj.contains_key("analysis_url"));
    }

    #[test]
    fn test_greeting_name_falls_back_to_id() {
        let user = SpotifyUser { id: "user42".to_string(), display_name: None };
        assert_eq!(user.greeting_name(), "user42");
    }
}
