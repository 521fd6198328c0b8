//! Murmur agent binary: an emotion-aware voice agent driven from the console.
//!
//! `murmur-agent [config.toml]` reads one transcribed utterance per stdin line
//! and writes each spoken reply as a WAV file. `murmur-agent generate-fillers
//! [config.toml]` renders the filler clips the agent plays on slow replies.

use murmur_agent::app::{build_agent, build_synthesizer, load_emotion_table, run_console};
use murmur_agent::config::{self, AgentConfig};
use murmur_agent::{generate_fillers, AppError};
use murmur_voice::{EmotionResolver, FillerConfig};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Converse,
    GenerateFillers,
}

fn parse_args() -> (Command, Option<String>) {
    let mut args = std::env::args().skip(1).peekable();
    let command = match args.peek().map(String::as_str) {
        Some("generate-fillers") => {
            args.next();
            Command::GenerateFillers
        }
        _ => Command::Converse,
    };
    (command, args.next().filter(|value| !value.trim().is_empty()))
}

fn resolve_config_path(cli_arg: Option<String>) -> (Option<String>, &'static str) {
    if let Some(path) = cli_arg {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("MURMUR_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() -> ExitCode {
    let (command, cli_config) = parse_args();
    let (resolved_config_path, config_source) = resolve_config_path(cli_config);
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = match config::load_config(selected_config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );
    tracing::debug!(?config, "effective configuration");

    let result = match command {
        Command::Converse => converse(&config).await,
        Command::GenerateFillers => render_fillers(&config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn converse(config: &AgentConfig) -> Result<(), AppError> {
    config.validate()?;
    let mut agent = build_agent(config)?;

    tracing::info!(
        output = %config.assets.output_dir.display(),
        "murmur agent ready, type a message per line (Ctrl+D to end)"
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let turns = run_console(&mut agent, stdin, shutdown_signal()).await?;

    tracing::info!(turns, "murmur agent shut down");
    Ok(())
}

async fn render_fillers(config: &AgentConfig) -> Result<(), AppError> {
    config.validate_tts()?;
    let filler_config = FillerConfig::load(&config.assets.filler_config)?;
    let table = load_emotion_table(&config.assets.emotion_config)?;
    let resolver = EmotionResolver::new(Arc::new(table));
    let tts = build_synthesizer(config);

    let summary = generate_fillers(
        &filler_config,
        &resolver,
        tts.as_ref(),
        &config.assets.filler_dir,
    )
    .await?;

    tracing::info!(
        dir = %config.assets.filler_dir.display(),
        written = summary.written.len(),
        failed = summary.failed,
        "filler generation finished"
    );
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, ending conversation"); }
        () = terminate => { tracing::info!("received SIGTERM, ending conversation"); }
    }
}
