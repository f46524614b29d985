use std::path::{Path, PathBuf};

use clap::Args;
use serde_json::{Value, json};

use crate::config::Settings;
use crate::error::{CardError, Result};
use crate::pipeline::{
    CardOutcome, CardRequest, CardService, DEFAULT_LENGTH, DEFAULT_MODE, DEFAULT_USERNAME,
};
use crate::theme::DEFAULT_THEME_NAME;
use crate::util::{CliOutput, OutputIntegration, now_utc_iso, output_for, write_string};

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    /// Monkeytype username.
    #[arg(short = 'u', long, default_value = DEFAULT_USERNAME)]
    pub username: String,

    /// Theme name, as listed on monkeytype.com.
    #[arg(short = 't', long, default_value = DEFAULT_THEME_NAME)]
    pub theme: String,

    /// Test mode (time/words).
    #[arg(short = 'm', long, default_value = DEFAULT_MODE)]
    pub mode: String,

    /// Test length (15/60/10...).
    #[arg(short = 'l', long, default_value = DEFAULT_LENGTH)]
    pub length: String,

    /// Where to write the card (default stats.svg).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Env-style settings file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Default for GenerateArgs {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            theme: DEFAULT_THEME_NAME.to_string(),
            mode: DEFAULT_MODE.to_string(),
            length: DEFAULT_LENGTH.to_string(),
            output: None,
            config: None,
        }
    }
}

impl GenerateArgs {
    #[must_use]
    pub fn card_request(&self) -> CardRequest {
        CardRequest::from_optional(
            Some(self.username.as_str()),
            Some(self.theme.as_str()),
            Some(self.mode.as_str()),
            Some(self.length.as_str()),
            false,
        )
    }
}

pub fn run_generate(args: GenerateArgs) -> Result<()> {
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(output) = &args.output {
        settings.output.clone_from(output);
    }
    run_generate_with_settings(&settings, &args.card_request())
}

pub fn run_generate_with_settings(settings: &Settings, request: &CardRequest) -> Result<()> {
    let integration = OutputIntegration::detect();
    let ui = output_for(&integration);
    let service = CardService::from_settings(settings)?;

    let outcome = generate_card(&service, request, &settings.output, &ui)?;

    if integration.should_emit_json() {
        println!(
            "{}",
            generate_summary_payload(request, &outcome, &settings.output, &integration)
        );
    }
    Ok(())
}

/// Runs the pipeline and writes the card. Only the file write can fail.
pub fn generate_card(
    service: &CardService,
    request: &CardRequest,
    output: &Path,
    ui: &CliOutput,
) -> Result<CardOutcome> {
    ui.info(&format!(
        "Generating stats for {} (Theme: {})...",
        request.username, request.theme
    ));

    let outcome = service.generate(request);
    if let Some(error) = &outcome.stats_error {
        ui.warning(&format!("Error fetching stats: {error}. Setting to 0."));
    }

    if let Err(error) = write_string(output, &outcome.svg) {
        ui.error(&format!("cannot write {}: {error}", output.display()));
        return Err(CardError::exit(
            1,
            format!("failed to write {}: {error}", output.display()),
        ));
    }

    ui.success(&format!("{} generated successfully!", output.display()));
    Ok(outcome)
}

fn generate_summary_payload(
    request: &CardRequest,
    outcome: &CardOutcome,
    output: &Path,
    integration: &OutputIntegration,
) -> Value {
    json!({
        "command": "generate",
        "status": "ok",
        "generated_at": now_utc_iso(),
        "output": output.display().to_string(),
        "username": request.username,
        "theme": outcome.theme.name,
        "mode": request.mode,
        "length": request.length,
        "wpm": outcome.wpm,
        "accuracy": outcome.accuracy,
        "stats_error": outcome.stats_error.as_ref().map(ToString::to_string),
        "integration": integration,
    })
}
