//! OpenAI client configuration with sensible defaults.

use crate::config::LlmSettings;
use crate::error::{MoodlistError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create an OpenAI client from the model settings.
///
/// The API key is read from `OPENAI_API_KEY` by `async-openai`.
pub fn create_client(settings: &LlmSettings) -> Result<Client<OpenAIConfig>> {
    let mut config = OpenAIConfig::default();
    if let Some(base) = &settings.api_base {
        config = config.with_api_base(base);
    }
    if let Some(project) = &settings.project_id {
        config = config.with_project_id(project);
    }

    create_client_with_timeout(config, settings.timeout())
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(
    config: OpenAIConfig,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| MoodlistError::Config(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Client::with_config(config).with_http_client(http_client))
}
