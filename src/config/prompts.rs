//! Prompt templates for moodlist.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub agent: AgentPrompts,
    pub image: ImagePrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts driving the conversation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    /// System prompt placed at the head of every conversation.
    pub system: String,
    /// Sent as a user message when the model answers with nothing usable.
    pub corrective: String,
    /// Appended to a tool error so the model retries with fixed arguments.
    pub tool_error: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an AI agent that operates the Spotify API and image analysis tools to respond to the user's requests.

Execution:
1. Use 'get_recent_audio_features' to get the audio features of the tracks the user listened to recently.
2. Based on those audio features and the image description or text input, select the tracks that fit the request best.
3. Use 'format_playlist_curation' with a playlist name, a description, the selected tracks (keep every feature field you were given) and a summary of how the playlist relates to the input.
4. Reply with the exact JSON returned by 'format_playlist_curation' and nothing else.

If a tool returns an error, read it carefully and call the tool again with corrected arguments.
Never select tracks that were not returned by 'get_recent_audio_features'."#
                .to_string(),

            corrective: "Respond with a real output.".to_string(),

            tool_error: "please fix your mistakes.".to_string(),
        }
    }
}

/// Prompts for image understanding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePrompts {
    pub instruction: String,
}

impl Default for ImagePrompts {
    fn default() -> Self {
        Self {
            instruction: "Analyze this image and describe its content, mood, and any musical themes it might inspire:".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }

            let image_path = custom_path.join("image.toml");
            if image_path.exists() {
                let content = std::fs::read_to_string(&image_path)?;
                prompts.image = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Load prompts as configured in the settings.
    pub fn from_settings(settings: &crate::config::Settings) -> crate::error::Result<Self> {
        Self::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// System prompt with custom config variables substituted.
    pub fn system_prompt(&self) -> String {
        Self::render(&self.agent.system, &self.variables)
    }

    pub fn corrective_prompt(&self) -> String {
        Self::render(&self.agent.corrective, &self.variables)
    }

    pub fn tool_error_prompt(&self) -> String {
        Self::render(&self.agent.tool_error, &self.variables)
    }

    pub fn image_instruction(&self) -> String {
        Self::render(&self.image.instruction, &self.variables)
    }
}
