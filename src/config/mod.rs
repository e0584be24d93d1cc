//! Configuration module for moodlist.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, ImagePrompts, Prompts};
pub use settings::{
    AgentSettings, LlmSettings, PromptSettings, ServerSettings, Settings, SpotifySettings,
};
