//! Triage Agent CLI
//!
//! Runs one triage case against Gemini and prints the report and action log.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use triage_agent::adapters::ai::{GeminiConfig, GeminiProvider};
use triage_agent::application::{verify_run, TurnOrchestrator};
use triage_agent::config::AppConfig;
use triage_agent::domain::tools::default_registry;
use triage_agent::domain::triage::ContentBundle;

#[derive(Parser)]
#[command(name = "triage-agent")]
#[command(about = "Multi-turn clinical triage with tool verification", long_about = None)]
#[command(version)]
struct Cli {
    /// Case file (JSON with notes, optional attachment, and summaries)
    #[arg(long)]
    case: PathBuf,

    /// Override the configured turn budget
    #[arg(long)]
    max_turns: Option<u32>,

    /// Print the verification summary after the report
    #[arg(long)]
    verify: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

/// On-disk case description.
#[derive(Debug, Deserialize)]
struct CaseFile {
    notes: String,
    #[serde(default)]
    attachment_path: Option<PathBuf>,
    #[serde(default)]
    attachment_mime: Option<String>,
    #[serde(default)]
    summaries: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(max_turns) = cli.max_turns {
        config.orchestration.max_turns = max_turns;
    }
    config.validate().context("Invalid configuration")?;

    let bundle = load_case(&cli.case)?;

    let Some(api_key) = config.ai.gemini_api_key.clone() else {
        bail!("TRIAGE_AGENT__AI__GEMINI_API_KEY is not set");
    };
    let gemini = GeminiConfig::from_secret(api_key)
        .with_model(config.ai.model.clone())
        .with_base_url(config.ai.base_url.clone())
        .with_timeout(config.ai.timeout());
    let provider = GeminiProvider::new(gemini).context("Failed to build Gemini client")?;

    let orchestrator =
        TurnOrchestrator::from_config(Arc::new(provider), default_registry(), &config.orchestration);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            trigger.cancel();
        }
    });

    info!(case = %cli.case.display(), model = %config.ai.model, "starting triage");

    match orchestrator.run(bundle, &cancel).await {
        Ok(run) => {
            println!("{}", serde_json::to_string_pretty(&run.report)?);
            println!();
            println!("Action log ({} entries):", run.action_log.len());
            for entry in run.action_log.entries() {
                println!("  {}", entry);
            }
            if cli.verify {
                println!();
                println!("{}", verify_run(&run));
            }
            Ok(())
        }
        Err(failure) => {
            eprintln!("{}", failure);
            eprintln!("Action log ({} entries):", failure.action_log.len());
            for entry in failure.action_log.entries() {
                eprintln!("  {}", entry);
            }
            if let Some(text) = &failure.last_response_text {
                eprintln!("Last response text:\n{}", text);
            }
            std::process::exit(1);
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("triage_agent=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Reads a case file. Attachment paths resolve against the case file's directory.
fn load_case(path: &Path) -> Result<ContentBundle> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read case file {}", path.display()))?;
    let case: CaseFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse case file {}", path.display()))?;

    let mut bundle = ContentBundle::new(case.notes);

    if let Some(attachment) = case.attachment_path {
        let resolved = match path.parent() {
            Some(dir) if attachment.is_relative() => dir.join(&attachment),
            _ => attachment,
        };
        let data = std::fs::read(&resolved)
            .with_context(|| format!("Failed to read attachment {}", resolved.display()))?;
        let mime = case
            .attachment_mime
            .unwrap_or_else(|| guess_mime(&resolved).to_string());
        bundle = bundle.with_attachment(mime, data);
    }

    for summary in case.summaries {
        bundle = bundle.with_summary(summary);
    }

    Ok(bundle)
}

fn guess_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_case_with_relative_attachment() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("xray.png"), [0x89, b'P', b'N', b'G']).unwrap();
        let case_path = dir.path().join("case.json");
        fs::write(
            &case_path,
            r#"{"notes":"62M, fever","attachment_path":"xray.png","summaries":["Lactate 4.8"]}"#,
        )
        .unwrap();

        let bundle = load_case(&case_path).unwrap();

        assert_eq!(bundle.notes(), "62M, fever");
        let attachment = bundle.attachment().unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.data.len(), 4);
        assert_eq!(bundle.summaries(), ["Lactate 4.8".to_string()]);
    }

    #[test]
    fn missing_attachment_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let case_path = dir.path().join("case.json");
        fs::write(&case_path, r#"{"notes":"n","attachment_path":"nope.png"}"#).unwrap();

        let err = load_case(&case_path).unwrap_err();
        assert!(err.to_string().contains("nope.png"));
    }

    #[test]
    fn explicit_mime_wins_over_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scan.bin"), [1, 2, 3]).unwrap();
        let case_path = dir.path().join("case.json");
        fs::write(
            &case_path,
            r#"{"notes":"n","attachment_path":"scan.bin","attachment_mime":"image/jpeg"}"#,
        )
        .unwrap();

        let bundle = load_case(&case_path).unwrap();
        assert_eq!(bundle.attachment().unwrap().mime_type, "image/jpeg");
    }
}
