//! CLI output formatting utilities.

use crate::agent::ToolCallRecord;
use crate::curation::{CurationOutcome, PlaylistCuration};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a curated playlist.
    pub fn curation(curation: &PlaylistCuration) {
        Self::header(&curation.playlist_name);
        println!("{}", style(&curation.playlist_description).italic());
        println!();

        for (i, track) in curation.tracks.iter().enumerate() {
            println!(
                "  {:>2}. {} {} {}",
                i + 1,
                style(json_text(&track.song_name)).bold(),
                style("-").dim(),
                json_text(&track.artists)
            );
            if !track.features.is_empty() {
                println!("      {}", style(feature_line(track)).dim());
            }
        }

        println!();
        println!("{}", curation.summary);
    }

    /// Print the result payload: the playlist when it has the curation shape, raw JSON otherwise.
    pub fn outcome(outcome: &CurationOutcome) {
        match (outcome.curation(), outcome) {
            (Some(curation), _) => Self::curation(&curation),
            (None, CurationOutcome::Parsed(value)) => {
                println!("{}", serde_json::to_string_pretty(value).unwrap_or_default())
            }
            (None, CurationOutcome::Failed { error, raw_content }) => {
                Self::error(error);
                println!("{}", raw_content);
            }
        }
    }

    /// Print a short list of the tool calls an agent made.
    pub fn tool_calls(calls: &[ToolCallRecord]) {
        if calls.is_empty() {
            return;
        }
        Self::header(&format!("Tool calls ({})", calls.len()));
        for call in calls {
            let marker = if call.is_error { style("!").red() } else { style("*").cyan() };
            println!("  {} {}", marker, truncate(&call.to_string(), 70));
        }
        println!();
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Render a JSON scalar without quotes.
fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A few headline features of a track, when present.
fn feature_line(track: &crate::curation::CuratedTrack) -> String {
    ["tempo", "energy", "valence", "danceability"]
        .iter()
        .filter_map(|key| {
            let value = track.features.get(*key)?.as_f64()?;
            Some(if *key == "tempo" {
                format!("{} {:.0} bpm", key, value)
            } else {
                format!("{} {:.2}", key, value)
            })
        })
        .collect::<Vec<_>>()
        .join(" · ")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_line() {
        let curation = PlaylistCuration::new(
            "P",
            "D",
            vec![json!({"id": "1", "tempo": 120.4, "valence": 0.456, "key": 5})
                .as_object()
                .cloned()
                .unwrap()],
            "S",
        );
        assert_eq!(feature_line(&curation.tracks[0]), "tempo 120 bpm · valence 0.46");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer string here", 10), "a longe...");
    }

    #[test]
    fn test_json_text() {
        assert_eq!(json_text(&json!("Bon Iver")), "Bon Iver");
        assert_eq!(json_text(&json!(42)), "42");
    }
}
