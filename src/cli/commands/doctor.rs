//! Doctor command - verify credentials and configuration.

use crate::cli::Output;
use crate::config::Settings;
use console::style;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("moodlist doctor");
    println!();
    println!("Checking credentials and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("Language Model").bold());
    let model_checks = vec![
        check_openai_api_key(std::env::var("OPENAI_API_KEY").ok()),
        CheckResult::ok("Models", &format!("{} (vision: {})", settings.llm.model, settings.llm.vision_model)),
    ];
    for check in &model_checks {
        check.print();
    }
    checks.extend(model_checks);

    println!();

    println!("{}", style("Spotify").bold());
    let spotify_checks = check_spotify(settings);
    for check in &spotify_checks {
        check.print();
    }
    checks.extend(spotify_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using moodlist.",
            errors
        ));
        anyhow::bail!("doctor found {} error(s)", errors);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! moodlist is ready to use.");
    }

    Ok(())
}

/// Check if the OpenAI API key is configured.
fn check_openai_api_key(value: Option<String>) -> CheckResult {
    match value {
        Some(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({})", masked))
        }
        Some(key) if key.is_empty() => CheckResult::error(
            "OPENAI_API_KEY",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Some(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        None => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

/// Check the OAuth app credentials and redirect URI used by `serve`.
fn check_spotify(settings: &Settings) -> Vec<CheckResult> {
    let spotify = &settings.spotify;
    let mut results = Vec::new();

    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());

    if present(&spotify.client_id) {
        results.push(CheckResult::ok("SPOTIFY_CLIENT_ID", "configured"));
    } else {
        results.push(CheckResult::warning(
            "SPOTIFY_CLIENT_ID",
            "not set",
            "Required for 'moodlist serve'. Create an app at https://developer.spotify.com/dashboard",
        ));
    }

    if present(&spotify.client_secret) {
        results.push(CheckResult::ok("SPOTIFY_CLIENT_SECRET", "configured"));
    } else {
        results.push(CheckResult::warning(
            "SPOTIFY_CLIENT_SECRET",
            "not set",
            "Required for 'moodlist serve'",
        ));
    }

    match url::Url::parse(&spotify.redirect_uri) {
        Ok(url) if url.path() == "/callback" => {
            results.push(CheckResult::ok("Redirect URI", &spotify.redirect_uri))
        }
        Ok(_) => results.push(CheckResult::warning(
            "Redirect URI",
            &spotify.redirect_uri,
            "The web server handles the OAuth callback at /callback",
        )),
        Err(e) => results.push(CheckResult::error(
            "Redirect URI",
            &format!("invalid ({})", e),
            "Set spotify.redirect_uri or SPOTIFY_REDIRECT_URI to e.g. http://127.0.0.1:8501/callback",
        )),
    }

    results
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: moodlist config edit",
        )
    }
}
