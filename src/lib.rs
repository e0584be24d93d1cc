//! moodlist - playlists curated from your listening history
//!
//! An LLM agent that builds a playlist from a free-text description or an
//! image, picking songs the user actually listened to recently.
//!
//! # Overview
//!
//! moodlist allows you to:
//! - Describe a mood in words, or upload a picture, and get a curated playlist
//! - Ground the picks in your recent Spotify plays and their audio features
//! - Run it from the command line or from a small web form with Spotify login
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management and prompt templates
//! - `input` - Turning text or image input into a single request
//! - `spotify` - Spotify Web API client and OAuth flow
//! - `tools` - The tools offered to the model and their dispatch
//! - `agent` - Conversation loop, tool dispatcher and chat model seam
//! - `curation` - Curation formatting and final result extraction
//! - `orchestrator` - Per-request pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use moodlist::config::Settings;
//! use moodlist::input::{PlaylistRequest, RequestInput};
//! use moodlist::orchestrator::Curator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let curator = Curator::new(settings)?;
//!
//!     let request = PlaylistRequest::new(RequestInput::Text("Rainy Sunday".to_string()), 10)?;
//!     let token = std::env::var("SPOTIFY_ACCESS_TOKEN")?;
//!     let report = curator.curate_with_token(&request, &token).await?;
//!     println!("{}", serde_json::to_string_pretty(&report.result)?);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod curation;
pub mod error;
pub mod input;
pub mod openai;
pub mod orchestrator;
pub mod spotify;
pub mod tools;

pub use error::{MoodlistError, Result};
