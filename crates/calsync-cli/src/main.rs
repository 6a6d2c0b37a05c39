//! calsync CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use calsync_cli::cli::{Cli, Command, ConfigAction};
use calsync_cli::commands::{self, OutputMode, appointments};
use calsync_cli::config::ClientConfig;
use calsync_cli::error::ClientResult;
use calsync_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output.trim_end());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> ClientResult<String> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let mut config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };
    apply_overrides(&mut config, &cli);

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::from_names(&config.logging.level, &config.logging.format)?
    };
    init_tracing(tracing_config)?;

    let provider = cli.provider;
    let output = OutputMode::from_flag(cli.json);
    let context = || commands::build_context(provider, &config, output);

    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => Ok(commands::config::path(&config_path)),
        },
        Command::Create(args) => appointments::create(&context()?, args).await,
        Command::List(args) => appointments::list(&context()?, args).await,
        Command::Slots(args) => appointments::slots(&context()?, args).await,
        Command::Check(range) => appointments::check(&context()?, range).await,
        Command::Cancel { id } => appointments::cancel(&context()?, &id).await,
        Command::Reschedule { id, range } => {
            appointments::reschedule(&context()?, &id, range).await
        }
        Command::Notes { id, text } => appointments::notes(&context()?, &id, &text).await,
        Command::Health => appointments::health(&context()?).await,
    }
}

/// Command-line flags win over config.toml.
fn apply_overrides(config: &mut ClientConfig, cli: &Cli) {
    if let Some(ref calendar_id) = cli.calendar_id {
        config.google.calendar_id = calendar_id.clone();
    }
    if let Some(ref path) = cli.credentials_file {
        config.google.credentials_file = Some(path.clone());
    }
    if let Some(ref token) = cli.access_token {
        config.google.access_token = Some(token.clone());
    }
}
