//! factguard CLI
//!
//! Usage:
//!   factguard verify "What is the capital of France?" --pretty
//!   factguard check --text "Paris is the capital of France."
//!   factguard extract --file answer.txt
//!   factguard config --config factguard.yaml

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use factguard_core::{ClaimExtractor, GenerationTier};
use factguard_runtime::{PipelineBuilder, RuntimeConfig, StaticGenerator};

#[derive(Parser)]
#[command(name = "factguard", version, about = "Verify generated answers claim by claim")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise log level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an answer for a query and verify it
    Verify {
        query: String,

        #[arg(long)]
        user_id: Option<String>,

        /// Include usage statistics in the output
        #[arg(long)]
        stats: bool,

        #[arg(long)]
        pretty: bool,
    },

    /// Verify an existing answer without regenerating it
    Check {
        #[command(flatten)]
        input: Input,

        #[arg(long)]
        pretty: bool,
    },

    /// Print the claims extracted from a text
    Extract {
        #[command(flatten)]
        input: Input,

        #[arg(long)]
        pretty: bool,
    },

    /// Print the effective configuration
    Config,
}

/// Text from a file, an argument or stdin.
#[derive(clap::Args)]
struct Input {
    #[arg(long, conflicts_with = "text")]
    file: Option<PathBuf>,

    #[arg(long)]
    text: Option<String>,
}

impl Input {
    fn read(&self) -> Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        if let Some(path) = &self.file {
            return std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()));
        }
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        Ok(buffer)
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let mut config = match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Verify {
            query,
            user_id,
            stats,
            pretty,
        } => {
            let pipeline = PipelineBuilder::from_config(&config)?.build()?;
            let report = pipeline.verify(&query, user_id.as_deref()).await;

            if stats {
                print_json(
                    &serde_json::json!({ "report": report, "stats": pipeline.stats() }),
                    pretty,
                )?;
            } else {
                print_json(&report, pretty)?;
            }
        }
        Command::Check { input, pretty } => {
            let text = input.read()?;
            let pipeline = PipelineBuilder::from_config(&config)?
                .generator(Arc::new(StaticGenerator::new(text)))
                .start_tier(GenerationTier::Llm)
                .build()?;
            let report = pipeline.verify("", None).await;
            print_json(&report, pretty)?;
        }
        Command::Extract { input, pretty } => {
            let text = input.read()?;
            let claims = ClaimExtractor::new().extract(&text);
            tracing::debug!(count = claims.len(), "Claims extracted");
            print_json(&claims, pretty)?;
        }
        Command::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_with_text() {
        let cli = Cli::parse_from(["factguard", "-v", "check", "--text", "Paris is big."]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Check { input, pretty } => {
                assert_eq!(input.read().unwrap(), "Paris is big.");
                assert!(!pretty);
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_file_and_text_conflict() {
        let parsed = Cli::try_parse_from(["factguard", "extract", "--file", "a.txt", "--text", "b"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/factguard.yaml"))).is_err());
    }
}
