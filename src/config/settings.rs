//! Configuration settings for moodlist.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub agent: AgentSettings,
    pub spotify: SpotifySettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Model driving the conversation loop.
    pub model: String,
    /// Multimodal model used to describe uploaded images.
    pub vision_model: String,
    /// Sampling temperature for both models.
    pub temperature: f32,
    /// Override for the API base URL (OpenAI-compatible endpoints).
    pub api_base: Option<String>,
    /// Project identifier sent with every model request.
    pub project_id: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            api_base: None,
            project_id: None,
            timeout_secs: 300,
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Conversation loop and tool dispatch limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum number of assistant turns per request.
    pub max_iterations: usize,
    /// Maximum consecutive empty model responses before giving up.
    pub max_empty_responses: usize,
    /// Attempts per tool call before the error is handed back to the model.
    pub tool_max_attempts: u32,
    /// Delay between tool attempts in milliseconds.
    pub tool_backoff_ms: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            max_empty_responses: 5,
            tool_max_attempts: 1,
            tool_backoff_ms: 500,
        }
    }
}

/// Spotify Web API and OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifySettings {
    /// Web API base URL.
    pub api_base: String,
    /// Accounts service base URL (authorize and token endpoints).
    pub accounts_base: String,
    /// OAuth client id (overridden by SPOTIFY_CLIENT_ID).
    pub client_id: Option<String>,
    /// OAuth client secret (overridden by SPOTIFY_CLIENT_SECRET).
    pub client_secret: Option<String>,
    /// OAuth redirect URI (overridden by SPOTIFY_REDIRECT_URI).
    pub redirect_uri: String,
    /// Space-separated OAuth scopes.
    pub scopes: String,
    /// Number of recent plays to analyse.
    pub recent_limit: u32,
    /// How far back to look for recent plays, in days.
    pub lookback_days: i64,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.spotify.com/v1".to_string(),
            accounts_base: "https://accounts.spotify.com".to_string(),
            client_id: None,
            client_secret: None,
            redirect_uri: "http://127.0.0.1:8501/callback".to_string(),
            scopes: [
                "user-read-recently-played",
                "user-library-read",
                "user-follow-read",
                "playlist-read-collaborative",
                "playlist-read-private",
                "playlist-modify-public",
                "playlist-modify-private",
            ]
            .join(" "),
            recent_limit: 50,
            lookback_days: 7,
            timeout_secs: 30,
        }
    }
}

impl SpotifySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Web server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body in megabytes. Uploaded images travel
    /// base64-encoded, so this should be about 4/3 of the largest image.
    pub max_upload_mb: usize,
    /// How long a `/login` redirect stays valid, in seconds.
    pub login_state_ttl_secs: u64,
    /// Sessions unused for this many minutes are dropped.
    pub session_idle_mins: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_upload_mb: 25,
            login_state_ttl_secs: 600,
            session_idle_mins: 60,
        }
    }
}

impl ServerSettings {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn login_state_ttl(&self) -> Duration {
        Duration::from_secs(self.login_state_ttl_secs)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_mins.saturating_mul(60))
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Credentials found in the environment take precedence over the file.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Overlay values from environment variables using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = non_empty("SPOTIFY_CLIENT_ID") {
            self.spotify.client_id = Some(id);
        }
        if let Some(secret) = non_empty("SPOTIFY_CLIENT_SECRET") {
            self.spotify.client_secret = Some(secret);
        }
        if let Some(uri) = non_empty("SPOTIFY_REDIRECT_URI") {
            self.spotify.redirect_uri = uri;
        }
        if let Some(project) = non_empty("OPENAI_PROJECT_ID") {
            self.llm.project_id = Some(project);
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::MoodlistError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("moodlist")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }
}
