//! Error types for moodlist.

use thiserror::Error;

/// Library-level error type for moodlist operations.
#[derive(Error, Debug)]
pub enum MoodlistError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Spotify API error: {0}")]
    Spotify(String),

    #[error("Spotify rejected the access token. Please log in again.")]
    SpotifyUnauthorized,

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MoodlistError {
    /// Whether this error means the user's Spotify session is no longer valid.
    pub fn is_expired_session(&self) -> bool {
        matches!(self, MoodlistError::SpotifyUnauthorized)
    }
}

/// Result type alias for moodlist operations.
pub type Result<T> = std::result::Result<T, MoodlistError>;
