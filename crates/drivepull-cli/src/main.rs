//! drivepull - pull a remote source tree into a cloud filesystem
//!
//! Walks the source tree through its read-only attribute/listing API and
//! recreates it under a destination directory, skipping files whose content
//! the destination already holds.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::pull::PullCommand;
use drivepull_core::config::Config;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "drivepull",
    version,
    about = "Pull a file tree from a read-only source into a cloud filesystem"
)]
pub struct Cli {
    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long)]
    config: Option<String>,

    #[command(flatten)]
    pull: PullCommand,
}

/// Installs the global subscriber
///
/// `RUST_LOG` wins over `-v`, which wins over `logging.level`.
fn init_tracing(verbose: u8, config: &Config) {
    let level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::load(std::path::Path::new(path)),
        None => Ok(Config::load_or_default(&Config::default_path())),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = cli.pull.apply_overrides(load_config(cli.config.as_deref())?)?;
    init_tracing(cli.verbose, &config);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    cli.pull.execute(config, format).await
}
