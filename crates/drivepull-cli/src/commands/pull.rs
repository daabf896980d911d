//! Pull command
//!
//! Wires the adapters to the engine:
//! 1. Applies command-line overrides to the configuration
//! 2. Locates the credentials file and primes the destination session
//! 3. Runs the [`PullEngine`] until it drains, aborts, or Ctrl-C cancels it
//! 4. Prints the final report and maps it to the exit status

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use drivepull_core::config::{Config, ConfigBuilder};
use drivepull_core::ports::{Credentials, DestinationApi};
use drivepull_remote::credentials::CREDENTIALS_FILE_NAME;
use drivepull_remote::{FileCredentialStore, RemoteClient};
use drivepull_source::SourceClient;
use drivepull_sync::{PullEngine, PullOptions, PullReport, ReauthCoordinator, RunOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::output::{get_formatter, print_report, OutputFormat};

/// Options of a pull run
#[derive(Debug, Args)]
pub struct PullCommand {
    /// Base URL of the source attribute/listing API
    #[arg(short = 'u', long)]
    pub base_url: Option<String>,

    /// Base URL of the destination API
    #[arg(short = 'd', long)]
    pub destination_url: Option<String>,

    /// Source entry to pull: id or path
    #[arg(short = 'p', long, default_value = "0")]
    pub push_id: String,

    /// Destination directory receiving the tree: id or path
    #[arg(short = 't', long, default_value = "0")]
    pub to_pid: String,

    /// Destination credentials, used instead of the credentials file content
    #[arg(short = 'c', long)]
    pub credentials: Option<String>,

    /// Credentials file, read at startup and rewritten after reauthentication
    #[arg(long)]
    pub credentials_path: Option<PathBuf>,

    /// Number of concurrently executing tasks
    #[arg(short = 'm', long)]
    pub max_workers: Option<usize>,

    /// Negative: retry recoverable errors forever; 0: never retry; n: retry any error n times
    #[arg(long, allow_negative_numbers = true)]
    pub max_retries: Option<i64>,

    /// Largest file sent by direct upload when instant upload fails; negative forbids it
    #[arg(long, allow_negative_numbers = true)]
    pub direct_upload_max_size: Option<i64>,

    /// Merge the source root's children into the target instead of creating a directory for it
    #[arg(short = 'n', long)]
    pub no_root: bool,

    /// Run destination create/list/attr calls one at a time
    #[arg(short = 'l', long)]
    pub lock_dir_methods: bool,

    /// Seconds between progress reports; 0 disables them
    #[arg(short = 's', long)]
    pub stats_interval: Option<u64>,
}

impl PullCommand {
    /// Layers the command-line options over `config`
    ///
    /// # Errors
    /// Returns the validation errors of the merged configuration
    pub fn apply_overrides(&self, config: Config) -> Result<Config> {
        let mut builder = ConfigBuilder::from_config(config);
        if let Some(url) = &self.base_url {
            builder = builder.source_base_url(url.clone());
        }
        if let Some(url) = &self.destination_url {
            builder = builder.destination_base_url(url.clone());
        }
        if let Some(n) = self.max_workers {
            builder = builder.max_workers(n);
        }
        if let Some(n) = self.max_retries {
            builder = builder.max_retries(n);
        }
        if let Some(limit) = self.direct_upload_max_size {
            builder = builder.direct_upload_max_size(Some(limit));
        }
        if self.no_root {
            builder = builder.no_root(true);
        }
        if self.lock_dir_methods {
            builder = builder.lock_dir_methods(true);
        }
        if let Some(secs) = self.stats_interval {
            builder = builder.stats_interval_secs(secs);
        }
        if let Some(path) = &self.credentials_path {
            builder = builder.credentials_path(path.clone());
        }

        builder.build_validated().map_err(|errors| {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            anyhow::anyhow!("Invalid configuration: {}", details.join("; "))
        })
    }

    /// Runs the pull and returns the process exit status
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<ExitCode> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let source = Arc::new(
            SourceClient::from_config(&config.source).context("Failed to set up source client")?,
        );
        let remote = Arc::new(
            RemoteClient::from_config(&config.destination)
                .context("Failed to set up destination client")?,
        );

        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let credentials_path = resolve_credentials_path(config.auth.credentials_path.clone(), &cwd);
        info!(path = %credentials_path.display(), "Using credentials file");
        let store = Arc::new(FileCredentialStore::new(credentials_path));

        let reauth = Arc::new(ReauthCoordinator::new(
            remote.clone(),
            store,
            config.auth.device_kind.clone(),
            config.auth.max_reauth_rounds,
            config.transfer.lock_dir_methods,
        ));
        match reauth.prime().await {
            Ok(true) => {}
            Ok(false) => info!("No stored credentials, a session will be requested on demand"),
            Err(e) => warn!(error = %e, "Failed to load stored credentials"),
        }
        if let Some(token) = &self.credentials {
            remote.set_credentials(Credentials::new(token.trim()));
        }

        let options = PullOptions::from_config(&config, self.push_id.clone(), self.to_pid.clone())?;
        let engine = PullEngine::new(source, remote, reauth, options);

        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after in-flight tasks");
                interrupt.cancel();
            }
        });

        let report = engine.run(cancel).await?;
        print_report(formatter.as_ref(), &report)?;
        Ok(exit_code(&report))
    }
}

/// Picks the credentials file
///
/// An explicit path wins; otherwise an existing `drivepull-credentials.txt`
/// in `cwd` or the home directory; otherwise a new file in `cwd`.
fn resolve_credentials_path(explicit: Option<PathBuf>, cwd: &std::path::Path) -> PathBuf {
    explicit
        .or_else(|| FileCredentialStore::discover(cwd))
        .unwrap_or_else(|| cwd.join(CREDENTIALS_FILE_NAME))
}

/// 0 on a clean run, 1 when tasks failed, 2 when aborted, 130 when interrupted
fn exit_code(report: &PullReport) -> ExitCode {
    match report.outcome {
        RunOutcome::Aborted(_) => ExitCode::from(2),
        RunOutcome::Interrupted => ExitCode::from(130),
        RunOutcome::Completed if report.stats.failed.total > 0 => ExitCode::from(1),
        RunOutcome::Completed => ExitCode::SUCCESS,
    }
}
