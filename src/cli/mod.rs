//! CLI module for moodlist.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// moodlist - playlists curated from your listening history
///
/// Describe a mood in words or hand over a picture, and an LLM agent picks
/// songs from your recent Spotify plays that fit it.
#[derive(Parser, Debug)]
#[command(name = "moodlist")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Curate a playlist from a description or an image
    #[command(group(ArgGroup::new("source").required(true).args(["text", "image"])))]
    Curate {
        /// Free-text description of the playlist you want
        #[arg(short, long)]
        text: Option<String>,

        /// Image file (jpg, jpeg or png) to build the playlist from
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Number of songs (5-50)
        #[arg(short, long, default_value = "10")]
        songs: u8,

        /// Spotify access token
        #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// LLM model to use for the conversation
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Start the web form with Spotify login
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check credentials and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curate_requires_a_source() {
        assert!(Cli::try_parse_from(["moodlist", "curate"]).is_err());
        assert!(
            Cli::try_parse_from(["moodlist", "curate", "--text", "a", "--image", "b.png"]).is_err()
        );
    }

    #[test]
    fn test_curate_defaults() {
        let cli = Cli::try_parse_from(["moodlist", "-v", "curate", "--text", "rainy day"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Curate { text, songs, image, .. } => {
                assert_eq!(text.as_deref(), Some("rainy day"));
                assert_eq!(songs, 10);
                assert!(image.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from(["moodlist", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
