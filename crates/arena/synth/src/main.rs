//! Arena Synth - declares the RPS Battle Arena topology and emits its manifest
//!
//! Configuration is read from the TOML file given by `--config` or
//! `ARENA_STACK_CONFIG` (defaults apply when unset or missing); command-line
//! flags override it. The manifest is written to the configured output file,
//! otherwise to stdout. Logs go to stderr.

use anyhow::Context;
use arena_stack::config::CONFIG_ENV_VAR;
use arena_stack::{declare_arena_stack, ManifestFormat, StackConfig};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Arena Synth CLI
#[derive(Debug, Parser)]
#[command(name = "arena-synth")]
#[command(about = "Arena Synth - declares the RPS Battle Arena topology and emits its manifest", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "ARENA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "ARENA_LOG_JSON")]
    json: bool,

    /// Write the manifest to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Manifest format
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Json,
    Yaml,
}

impl From<FormatArg> for ManifestFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Json => ManifestFormat::Json,
            FormatArg::Yaml => ManifestFormat::Yaml,
        }
    }
}

impl Cli {
    /// Override configured values with the ones given on the command line.
    fn apply(self, config: &mut StackConfig) {
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.json {
            config.logging.json = true;
        }
        if let Some(output) = self.output {
            config.manifest.output = Some(output);
        }
        if let Some(format) = self.format {
            config.manifest.format = format.into();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = StackConfig::load(cli.config.as_deref())
        .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

    // Override with CLI args
    cli.apply(&mut config);

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::info!(stack = %config.naming.stack_name, "Declaring arena topology");

    let arena = declare_arena_stack(&config).context("arena topology is invalid")?;
    let manifest = arena.stack.synth().context("synthesis failed")?;

    match &config.manifest.output {
        Some(path) => manifest
            .write_to(path, config.manifest.format)
            .with_context(|| format!("failed to write manifest to {}", path.display()))?,
        None => println!("{}", manifest.render(config.manifest.format)?),
    }

    Ok(())
}
