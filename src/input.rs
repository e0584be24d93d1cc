//! Turning user input (text or image) into a single natural-language request.

use crate::error::{MoodlistError, Result};
use crate::tools::ImageDescriber;
use base64::Engine;
use std::path::Path;
use tracing::{debug, info};

pub const MIN_SONGS: u8 = 5;
pub const MAX_SONGS: u8 = 50;
pub const DEFAULT_SONGS: u8 = 10;

/// What the user gave us to build a playlist from.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestInput {
    /// Free-text description of the desired playlist.
    Text(String),
    /// An image encoded as a `data:image/...;base64,` URL.
    Image(String),
}

/// A validated playlist request.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistRequest {
    pub input: RequestInput,
    pub song_count: u8,
}

impl PlaylistRequest {
    /// Validate and build a request.
    pub fn new(input: RequestInput, song_count: u8) -> Result<Self> {
        if !(MIN_SONGS..=MAX_SONGS).contains(&song_count) {
            return Err(MoodlistError::InvalidInput(format!(
                "Number of songs must be between {} and {}, got {}",
                MIN_SONGS, MAX_SONGS, song_count
            )));
        }

        match &input {
            RequestInput::Text(text) if text.trim().is_empty() => {
                return Err(MoodlistError::InvalidInput(
                    "Please provide a description before creating a playlist".to_string(),
                ));
            }
            RequestInput::Image(url) if !is_image_data_url(url) => {
                return Err(MoodlistError::InvalidInput(
                    "Image must be a base64 data URL (data:image/...;base64,...)".to_string(),
                ));
            }
            _ => {}
        }

        Ok(Self { input, song_count })
    }

    /// The request text before any image description is added.
    pub fn question(&self) -> String {
        match &self.input {
            RequestInput::Text(text) => format!(
                "Create a playlist with {} songs that match the following description: {}",
                self.song_count,
                text.trim()
            ),
            RequestInput::Image(_) => format!(
                "Create a playlist with {} songs based on this image.",
                self.song_count
            ),
        }
    }

    /// Produce the final request text, describing the image first when there is one.
    pub async fn normalize(&self, describer: &dyn ImageDescriber) -> Result<String> {
        let question = self.question();
        match &self.input {
            RequestInput::Text(_) => Ok(question),
            RequestInput::Image(data_url) => {
                info!("Describing uploaded image before planning");
                let description = describer.describe(data_url).await?;
                debug!("Image description: {}", description);
                Ok(with_image_description(&question, &description))
            }
        }
    }
}

/// Prefix a request with the description of the uploaded image.
pub fn with_image_description(question: &str, description: &str) -> String {
    format!("Based on this image description: {}\n\n{}", description, question)
}

fn is_image_data_url(url: &str) -> bool {
    url.starts_with("data:image/") && url.contains(";base64,")
}

/// MIME type for an accepted image file extension.
fn image_mime_type(extension: &str) -> Option<&'static str> {
    match extension.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// Encode image bytes as a data URL, deriving the MIME type from the file name.
pub fn image_to_data_url(file_name: &str, bytes: &[u8]) -> Result<String> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let mime = image_mime_type(extension).ok_or_else(|| {
        MoodlistError::InvalidInput(format!(
            "Unsupported image type '{}': use jpg, jpeg or png",
            file_name
        ))
    })?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{};base64,{}", mime, encoded))
}

/// Read an image file from disk into a data URL.
pub async fn load_image(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    image_to_data_url(file_name, &bytes)
}
