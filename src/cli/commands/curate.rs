//! Curate command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::input::{self, PlaylistRequest, RequestInput};
use crate::orchestrator::Curator;
use anyhow::Result;
use std::path::PathBuf;

/// Run the curate command.
pub async fn run_curate(
    text: Option<String>,
    image: Option<PathBuf>,
    songs: u8,
    token: Option<String>,
    model: Option<String>,
    mut settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Curate, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'moodlist doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    if let Some(model) = model {
        settings.llm.model = model;
    }

    let input = match (text, image) {
        (Some(text), _) => RequestInput::Text(text),
        (None, Some(path)) => RequestInput::Image(input::load_image(&path).await?),
        (None, None) => anyhow::bail!("Provide either --text or --image"),
    };
    let request = PlaylistRequest::new(input, songs)?;

    let curator = Curator::new(settings)?;
    let token = token.unwrap_or_default();

    let spinner = Output::spinner("Curating your playlist...");
    let report = curator.curate_with_token(&request, &token).await;
    spinner.finish_and_clear();

    let report = match report {
        Ok(report) => report,
        Err(e) if e.is_expired_session() => {
            Output::error(&format!("{}", e));
            Output::info("Get a fresh token and pass it with --token or SPOTIFY_ACCESS_TOKEN.");
            return Err(e.into());
        }
        Err(e) => {
            Output::error(&format!("Curation failed: {}", e));
            return Err(e.into());
        }
    };

    Output::outcome(&report.result);
    println!();
    Output::tool_calls(&report.tool_calls);
    Output::info(&format!(
        "Completed in {} iteration(s) (request {})",
        report.iterations, report.request_id
    ));

    Ok(())
}
