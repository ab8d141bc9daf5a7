use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rusty_executor::telemetry::TelemetryManager;
use rusty_executor::{
    EngineConfig, ExecutionEngine, ExecutionRequest, ExecutionResponse, LanguagesResponse,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the engine configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print execution telemetry to stderr before exiting
    #[arg(long)]
    stats: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute source code and print the result as JSON
    Run {
        /// Language identifier (case-insensitive)
        #[arg(short, long)]
        language: String,

        /// Source file; stdin is read when neither a file nor --code is given
        file: Option<PathBuf>,

        /// Inline source code
        #[arg(long, conflicts_with = "file")]
        code: Option<String>,
    },

    /// List supported languages
    Languages,

    /// Print the effective configuration as TOML
    Config {
        /// Write the default configuration file instead
        #[arg(long)]
        init: bool,

        /// With --init, overwrite an existing file
        #[arg(long, requires = "init")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(EngineConfig::default_path);
    let config = EngineConfig::load(&config_path)?;

    setup_logging(&config.log_level, cli.json_logs);
    TelemetryManager::init("rusty-executor");

    match cli.command {
        Commands::Run { language, file, code } => {
            let source = read_source(file, code)?;
            let request = match ExecutionRequest::new(source, &language, config.max_code_length) {
                Ok(request) => request,
                Err(e) => {
                    error!("Invalid request: {}", e);
                    bail!("Invalid request: {}", e);
                }
            };

            let engine = ExecutionEngine::new(config);
            let result = engine.execute_request(&request).await;
            let response = ExecutionResponse::new(request.language(), result);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Languages => {
            let engine = ExecutionEngine::new(config);
            let response = LanguagesResponse::new(engine.supported_languages());
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Config { init: false, .. } => {
            print!("{}", toml::to_string(&config).context("Failed to serialize config to TOML")?);
        }

        Commands::Config { init: true, force } => {
            if config_path.exists() && !force {
                bail!("Config file already exists at {:?}; pass --force to overwrite", config_path);
            }
            EngineConfig::default().save(&config_path)?;
            info!("Wrote default configuration to {:?}", config_path);
            println!("{}", config_path.display());
        }
    }

    if cli.stats {
        if let Ok(telemetry) = TelemetryManager::global() {
            eprintln!("{}", serde_json::to_string_pretty(&telemetry.snapshot())?);
        }
    }
    TelemetryManager::shutdown();

    Ok(())
}

fn read_source(file: Option<PathBuf>, code: Option<String>) -> Result<String> {
    if let Some(code) = code {
        return Ok(code);
    }
    if let Some(file) = file {
        return std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read source file: {:?}", file));
    }
    let mut source = String::new();
    std::io::stdin()
        .read_to_string(&mut source)
        .context("Failed to read source from stdin")?;
    Ok(source)
}

fn setup_logging(default_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
