//! posthaste - concurrent bulk transfers for Swift object storage.
//!
//! Usage:
//!   posthaste -c CONTAINER upload DIRECTORY     Upload a directory tree
//!   posthaste -c CONTAINER download DIRECTORY   Download a whole container
//!   posthaste -c CONTAINER delete               Delete every object
//!   posthaste --help                            Show help

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tracing::info;
use tracing_subscriber::EnvFilter;

use posthaste_core::{
    Credentials, DEFAULT_AUTH_URL, IdentityScheme, ServiceSelector, Settings, TransferConfig,
};
use posthaste_scan::ScanConfig;
use posthaste_transfer::{TransferJob, TransferReport};

#[derive(Parser)]
#[command(
    name = "posthaste",
    version,
    about = "Concurrent bulk upload, download and delete for Swift object storage",
    long_about = "posthaste moves whole directory trees into and out of a Swift \
                  container using many concurrent requests.\n\n\
                  Credentials come from the command line, the OS_* environment \
                  variables, or <config dir>/posthaste/config.toml, in that order."
)]
struct Cli {
    /// The container to operate on
    #[arg(short, long, global = true)]
    container: Option<String>,

    /// Region where the container exists (default DFW)
    #[arg(short, long, global = true, env = "OS_REGION_NAME")]
    region: Option<String>,

    /// Number of concurrent workers (default 10)
    #[arg(short, long, global = true)]
    threads: Option<usize>,

    /// Username to authenticate with
    #[arg(short, long, global = true, env = "OS_USERNAME")]
    username: Option<String>,

    /// API key or password to authenticate with
    #[arg(short, long, global = true, env = "OS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Identity type: rackspace (api-key) or keystone (password)
    #[arg(short, long, global = true)]
    identity: Option<IdentityScheme>,

    /// Identity service URL
    #[arg(long, global = true, env = "OS_AUTH_URL")]
    auth_url: Option<String>,

    /// Use the internal (service network) endpoint
    #[arg(long, global = true)]
    internal: bool,

    /// Catalog name of the storage service (e.g. cloudFiles)
    #[arg(long, global = true)]
    service_name: Option<String>,

    /// Queue depth at which listing pauses (default 50000)
    #[arg(long, global = true)]
    queue_ceiling: Option<usize>,

    /// Glob pattern of object names to skip when uploading (repeatable)
    #[arg(long, global = true)]
    exclude: Vec<String>,

    /// Output format for the final report
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Increase log verbosity (-v workers and listing, -vv object names)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload files to the container
    Upload {
        /// The directory to upload
        directory: PathBuf,
    },

    /// Download every object of the container
    Download {
        /// Directory to download into
        directory: PathBuf,
    },

    /// Delete every object of the container
    Delete,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load().context("Failed to load settings file")?;
    let config = build_config(&cli, &settings)?;
    let credentials = build_credentials(&cli, &settings)?;
    let format = cli.format;

    let job = TransferJob::with_credentials(config, credentials)
        .context("Failed to create transfer job")?;

    let cancel = job.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, cancelling");
            cancel.cancel();
        }
    });

    let report = match cli.command {
        Command::Upload { directory } => {
            let scan = ScanConfig::builder()
                .root(directory)
                .exclude(cli.exclude)
                .build()
                .map_err(|e| eyre!("Invalid scan configuration: {e}"))?;
            job.upload(scan).await.context("Upload failed")?
        }
        Command::Download { directory } => job
            .download(directory)
            .await
            .context("Download failed")?,
        Command::Delete => job.delete().await.context("Delete failed")?,
    };

    print_report(&report, format)?;

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Install the fmt subscriber. `RUST_LOG` overrides the `-v` count.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_config(cli: &Cli, settings: &Settings) -> Result<TransferConfig> {
    let container = cli
        .container
        .clone()
        .ok_or_else(|| eyre!("A container is required (--container)"))?;

    let mut builder = TransferConfig::builder();
    builder.container(container);
    if let Some(threads) = cli.threads.or(settings.threads) {
        builder.threads(threads);
    }
    if let Some(ceiling) = cli.queue_ceiling.or(settings.queue_ceiling) {
        builder.queue_ceiling(ceiling);
    }
    builder.build().context("Invalid configuration")
}

fn build_credentials(cli: &Cli, settings: &Settings) -> Result<Credentials> {
    let username = cli
        .username
        .clone()
        .or_else(|| settings.username.clone())
        .ok_or_else(|| eyre!("A username is required (--username or OS_USERNAME)"))?;
    let secret = cli
        .password
        .clone()
        .ok_or_else(|| eyre!("An API key or password is required (--password or OS_PASSWORD)"))?;
    let region = cli
        .region
        .clone()
        .or_else(|| settings.region.clone())
        .unwrap_or_else(|| "DFW".to_string());
    let identity = cli.identity.or(settings.identity).unwrap_or_default();
    let auth_url = cli
        .auth_url
        .clone()
        .or_else(|| settings.auth_url.clone())
        .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string());

    let service = ServiceSelector {
        service_name: cli
            .service_name
            .clone()
            .or_else(|| settings.service_name.clone()),
        ..ServiceSelector::default()
    };

    Ok(Credentials::new(identity, username, secret, region)
        .with_auth_url(auth_url)
        .with_internal(cli.internal || settings.internal.unwrap_or(false))
        .with_service(service))
}

fn print_report(report: &TransferReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            let summary = report.summary();
            println!();
            if report.is_success() {
                println!("Completed Successfully");
            } else {
                println!("Errors:");
                for record in &report.errors {
                    println!("  {record}");
                }
                println!();
            }
            println!(
                "{} {} objects ({}) in {:.2}s, {} failed, {} re-authentication(s)",
                report.operation.past_tense(),
                summary.completed,
                format_size(summary.bytes),
                summary.duration.as_secs_f64(),
                summary.failed,
                summary.reauths,
            );
        }
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = parse(&["posthaste", "-c", "media", "-t", "4", "upload", "/srv/www"]);
        assert_eq!(cli.container.as_deref(), Some("media"));
        assert_eq!(cli.threads, Some(4));
        assert!(matches!(cli.command, Command::Upload { ref directory } if directory == &PathBuf::from("/srv/www")));

        let cli = parse(&["posthaste", "delete", "-c", "media", "-vv"]);
        assert!(matches!(cli.command, Command::Delete));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_identity_aliases() {
        let cli = parse(&["posthaste", "-c", "m", "-i", "keystone", "delete"]);
        assert_eq!(cli.identity, Some(IdentityScheme::Password));
        let cli = parse(&["posthaste", "-c", "m", "-i", "rackspace", "delete"]);
        assert_eq!(cli.identity, Some(IdentityScheme::ApiKey));
    }

    #[test]
    fn test_settings_fill_gaps() {
        let cli = parse(&[
            "posthaste", "-c", "media", "-u", "alice", "-p", "key", "-r", "ORD", "delete",
        ]);
        let settings = Settings {
            region: Some("LON".to_string()),
            threads: Some(32),
            service_name: Some("cloudFiles".to_string()),
            ..Settings::default()
        };

        let config = build_config(&cli, &settings).unwrap();
        assert_eq!(config.threads, 32);
        assert_eq!(config.container, "media");

        let credentials = build_credentials(&cli, &settings).unwrap();
        assert_eq!(credentials.region, "ORD");
        assert_eq!(credentials.service.service_name.as_deref(), Some("cloudFiles"));
        assert_eq!(credentials.auth_url, DEFAULT_AUTH_URL);
    }

    #[test]
    fn test_missing_container() {
        let cli = parse(&["posthaste", "delete"]);
        assert!(build_config(&cli, &Settings::default()).is_err());
    }
}
