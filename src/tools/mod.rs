//! Tool definitions and implementations for the playlist agent.

mod image;

pub use image::{ImageDescriber, ModelImageDescriber};

use crate::agent::ToolSpec;
use crate::curation::format_curation;
use crate::error::{MoodlistError, Result};
use crate::spotify::AudioFeatureSource;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

pub const AUDIO_FEATURES_TOOL: &str = "get_recent_audio_features";
pub const DESCRIBE_IMAGE_TOOL: &str = "describe_image";
pub const FORMAT_CURATION_TOOL: &str = "format_playlist_curation";

/// A parsed tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    /// Fetch audio features of the user's recently played tracks.
    RecentAudioFeatures,

    /// Describe the content and mood of an image.
    DescribeImage { image_string: String },

    /// Format the final curation as JSON.
    FormatCuration {
        playlist_name: String,
        playlist_description: String,
        tracks: Vec<Map<String, Value>>,
        summary: String,
    },
}

#[derive(Deserialize)]
struct DescribeImageArgs {
    image_string: String,
}

#[derive(Deserialize)]
struct FormatCurationArgs {
    playlist_name: String,
    playlist_description: String,
    tracks: Vec<Map<String, Value>>,
    summary: String,
}

/// Tool execution context with access to the user's library and the image model.
pub struct ToolContext {
    pub features: Arc<dyn AudioFeatureSource>,
    pub images: Arc<dyn ImageDescriber>,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(features: Arc<dyn AudioFeatureSource>, images: Arc<dyn ImageDescriber>) -> Self {
        Self { features, images }
    }

    /// Execute a tool call and return the result as a string.
    pub async fn execute(&self, tool: &ToolCall) -> Result<String> {
        match tool {
            ToolCall::RecentAudioFeatures => {
                let tracks = self.features.recent_track_features().await?;
                info!("Returning audio features for {} tracks", tracks.len());
                Ok(serde_json::to_string(&tracks)?)
            }
            ToolCall::DescribeImage { image_string } => self.images.describe(image_string).await,
            ToolCall::FormatCuration {
                playlist_name,
                playlist_description,
                tracks,
                summary,
            } => format_curation(playlist_name, playlist_description, tracks.clone(), summary),
        }
    }
}

/// Tool declarations bound to the model.
pub fn tool_definitions() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: AUDIO_FEATURES_TOOL.to_string(),
            description: "Fetch the audio features (tempo, energy, valence, danceability, ...) \
                of the tracks the user played recently. This tool does not take any arguments."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolSpec {
            name: DESCRIBE_IMAGE_TOOL.to_string(),
            description: "Analyze an image and return a description of its content, mood, \
                and potential musical themes. Requires the image as a data URL string."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "image_string": {
                        "type": "string",
                        "description": "The image to analyze, as a data URL"
                    }
                },
                "required": ["image_string"]
            }),
        },
        ToolSpec {
            name: FORMAT_CURATION_TOOL.to_string(),
            description: "Format the playlist curation into the final structured JSON. \
                Call this once the tracks have been selected."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "playlist_name": {
                        "type": "string",
                        "description": "Name of the playlist"
                    },
                    "playlist_description": {
                        "type": "string",
                        "description": "Description of the playlist"
                    },
                    "tracks": {
                        "type": "array",
                        "description": "Selected tracks with their features (song_name, artists, id and feature fields)",
                        "items": { "type": "object" }
                    },
                    "summary": {
                        "type": "string",
                        "description": "Summary of how the curation was created"
                    }
                },
                "required": ["playlist_name", "playlist_description", "tracks", "summary"]
            }),
        },
    ]
}

/// Parse a tool call from the model's name and raw JSON arguments.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    // Argument-less calls may arrive with an empty string
    let args: Value = if arguments.trim().is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_str(arguments)
            .map_err(|e| MoodlistError::Tool(format!("Invalid tool arguments: {}", e)))?
    };

    let invalid = |e: serde_json::Error| {
        MoodlistError::Tool(format!("Invalid arguments for {}: {}", name, e))
    };

    match name {
        AUDIO_FEATURES_TOOL => Ok(ToolCall::RecentAudioFeatures),
        DESCRIBE_IMAGE_TOOL => {
            let args: DescribeImageArgs = serde_json::from_value(args).map_err(invalid)?;
            Ok(ToolCall::DescribeImage {
                image_string: args.image_string,
            })
        }
        FORMAT_CURATION_TOOL => {
            let args: FormatCurationArgs = serde_json::from_value(args).map_err(invalid)?;
            Ok(ToolCall::FormatCuration {
                playlist_name: args.playlist_name,
                playlist_description: args.playlist_description,
                tracks: args.tracks,
                summary: args.summary,
            })
        }
        _ => Err(MoodlistError::Tool(format!("Unknown tool: {}", name))),
    }
}
