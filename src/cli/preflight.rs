//! Pre-flight checks before expensive operations.
//!
//! Validates that required credentials are available before starting
//! operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{MoodlistError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Curating from the CLI requires the model API key.
    Curate,
    /// Serving the web form also requires the Spotify OAuth app credentials.
    Serve,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    check_api_key(std::env::var("OPENAI_API_KEY").ok())?;

    match operation {
        Operation::Curate => {}
        Operation::Serve => check_spotify_app(settings)?,
    }
    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_api_key(value: Option<String>) -> Result<()> {
    match value {
        Some(key) if !key.is_empty() => Ok(()),
        Some(_) => Err(MoodlistError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        None => Err(MoodlistError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

/// Check the Spotify OAuth app is configured.
fn check_spotify_app(settings: &Settings) -> Result<()> {
    let missing = |v: &Option<String>| !v.as_deref().is_some_and(|s| !s.is_empty());

    if missing(&settings.spotify.client_id) {
        return Err(MoodlistError::MissingCredential(
            "SPOTIFY_CLIENT_ID not set. Set it in the environment or in spotify.client_id".to_string(),
        ));
    }
    if missing(&settings.spotify.client_secret) {
        return Err(MoodlistError::MissingCredential(
            "SPOTIFY_CLIENT_SECRET not set. Set it in the environment or in spotify.client_secret"
                .to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_required() {
        assert!(check_api_key(None).is_err());
        assert!(check_api_key(Some(String::new())).is_err());
        assert!(check_api_key(Some("sk-test".to_string())).is_ok());
    }

    #[test]
    fn test_serve_requires_spotify_app() {
        let mut settings = Settings::default();
        assert!(check_spotify_app(&settings).is_err());

        settings.spotify.client_id = Some("id".to_string());
        settings.spotify.client_secret = Some(String::new());
        assert!(check_spotify_app(&settings).is_err());

        settings.spotify.client_secret = Some("secret".to_string());
        assert!(check_spotify_app(&settings).is_ok());
    }
}
