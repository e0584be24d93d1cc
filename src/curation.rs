//! Playlist curation payload: formatting the tool output and extracting the final answer.

use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Keys lifted out of a track mapping; everything else becomes a feature.
const TRACK_IDENTITY_KEYS: [&str; 3] = ["song_name", "artists", "id"];

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```[A-Za-z0-9_+-]*").expect("Invalid regex"));
static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*$").expect("Invalid regex"));

/// One selected track in a curation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedTrack {
    pub song_name: Value,
    pub artists: Value,
    pub id: Value,
    pub features: Map<String, Value>,
}

impl CuratedTrack {
    /// Re-shape a free-form track mapping. Missing identity keys become "".
    pub fn from_mapping(mut track: Map<String, Value>) -> Self {
        let mut take = |key: &str| track.remove(key).unwrap_or_else(|| Value::String(String::new()));
        let song_name = take(TRACK_IDENTITY_KEYS[0]);
        let artists = take(TRACK_IDENTITY_KEYS[1]);
        let id = take(TRACK_IDENTITY_KEYS[2]);

        Self {
            song_name,
            artists,
            id,
            features: track,
        }
    }
}

/// The final playlist produced for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistCuration {
    pub playlist_name: String,
    pub playlist_description: String,
    pub tracks: Vec<CuratedTrack>,
    pub summary: String,
}

impl PlaylistCuration {
    pub fn new(
        playlist_name: &str,
        playlist_description: &str,
        tracks: Vec<Map<String, Value>>,
        summary: &str,
    ) -> Self {
        Self {
            playlist_name: playlist_name.to_string(),
            playlist_description: playlist_description.to_string(),
            tracks: tracks.into_iter().map(CuratedTrack::from_mapping).collect(),
            summary: summary.to_string(),
        }
    }

    /// Two-space indented JSON.
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Format curation arguments into indented JSON text.
pub fn format_curation(
    playlist_name: &str,
    playlist_description: &str,
    tracks: Vec<Map<String, Value>>,
    summary: &str,
) -> Result<String> {
    PlaylistCuration::new(playlist_name, playlist_description, tracks, summary).to_pretty_json()
}

/// Result of parsing the model's closing answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CurationOutcome {
    /// The answer parsed as JSON.
    Parsed(Value),
    /// The answer was not JSON.
    Failed { error: String, raw_content: String },
}

impl CurationOutcome {
    pub fn is_parsed(&self) -> bool {
        matches!(self, CurationOutcome::Parsed(_))
    }

    /// Typed curation, when the parsed payload has the curation shape.
    pub fn curation(&self) -> Option<PlaylistCuration> {
        match self {
            CurationOutcome::Parsed(value) => serde_json::from_value(value.clone()).ok(),
            CurationOutcome::Failed { .. } => None,
        }
    }
}

/// Remove a leading and trailing markdown code fence, if present.
pub fn strip_code_fences(text: &str) -> String {
    let without_leading = LEADING_FENCE.replace(text, "");
    let without_trailing = TRAILING_FENCE.replace(&without_leading, "");
    without_trailing.trim().to_string()
}

/// Parse the final assistant text. Never fails; parse errors become a `Failed` payload.
pub fn extract_result(content: &str) -> CurationOutcome {
    let cleaned = strip_code_fences(content);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => CurationOutcome::Parsed(value),
        Err(e) => CurationOutcome::Failed {
            error: format!("Failed to parse JSON: {}", e),
            raw_content: content.to_string(),
        },
    }
}
