use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use haste::auth::{self, Credentials};
use haste::config::{AppConfig, AuthMethod};
use haste::context::AppContext;
use haste::core::{Operation, Orchestrator, RunReport};
use haste::logging::{self, LogConfig};
use haste::store::{ObjectStore, SwiftStore};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "haste")]
#[command(about = "Concurrent bulk transfers to and from Cloud Files containers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: GlobalArgs,

    /// TOML configuration file (default: haste.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local directory tree into a container
    Upload { source: PathBuf, container: String },
    /// Download every object of a container into a directory
    Download {
        container: String,
        destination: PathBuf,
    },
    /// Delete every object in a container
    Delete { container: String },
    /// List a container's objects, or the account's containers
    List { container: Option<String> },
}

impl From<Commands> for Operation {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Upload { source, container } => Operation::Upload { source, container },
            Commands::Download {
                container,
                destination,
            } => Operation::Download {
                container,
                destination,
            },
            Commands::Delete { container } => Operation::Delete { container },
            Commands::List { container } => Operation::List { container },
        }
    }
}

/// Flags layered over the config file and environment.
#[derive(Args, Serialize)]
struct GlobalArgs {
    /// Username to authenticate with [env: OS_USERNAME]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    username: Option<String>,

    /// API key (or password) to authenticate with [env: OS_PASSWORD]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, alias = "password", global = true)]
    api_key: Option<String>,

    /// Region of the object-store endpoint [env: OS_REGION_NAME]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    region: Option<String>,

    /// Number of concurrent operations [default: 10]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    identity_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, value_enum, global = true)]
    auth_method: Option<AuthMethod>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    tenant: Option<String>,

    /// Use the service-net (internalURL) endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    internal_url: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    json_logs: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::new(cli.config.as_deref(), Some(&cli.options))
        .context("Invalid configuration")?;

    logging::init(LogConfig {
        json: config.json_logs,
        verbose: config.verbose,
    });

    let operation = Operation::from(cli.command);
    let report = run(config, &operation).await?;
    summarize(&operation, &report);

    Ok(())
}

async fn run(config: AppConfig, operation: &Operation) -> Result<RunReport> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("haste/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(config.concurrency)
        .build()
        .context("Failed to build HTTP client")?;

    let session = auth::authenticate(
        &client,
        &config.identity_url,
        &Credentials::from(&config),
        &config.region,
        config.internal_url,
    )
    .await?
    .with_container(operation.container().map(str::to_string));

    let store: Arc<dyn ObjectStore> = Arc::new(SwiftStore::new(client, Arc::new(session)));
    let ctx = AppContext::new(config, store);

    Orchestrator::new(ctx)
        .run(operation)
        .await
        .with_context(|| format!("{} failed", operation.name()))
}

fn summarize(operation: &Operation, report: &RunReport) {
    info!(
        operation = operation.name(),
        succeeded = report.succeeded,
        failed = report.failed.len(),
        bytes = report.bytes,
        elapsed_secs = format!("{:.2}", report.elapsed.as_secs_f64()),
        "Run complete"
    );

    for failure in &report.failed {
        warn!(key = %failure.key, error = %failure.error, "Not transferred");
    }
}
