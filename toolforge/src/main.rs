mod config;
mod errors;
mod ssh;

use clap::{Parser, Subcommand};
use config::{Config, LoggingConfig, MetricsConfig};
use errors::CliError;
use metrics_exporter_statsd::StatsdBuilder;
use replicas::ReplicasClient;
use replicas::registry::ConfiguredRegistry;
use ssh::SshArgs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const METRICS_PREFIX: &str = "toolforge";

#[derive(Parser)]
#[command(name = "toolforge", version, about = "Toolforge replica tooling")]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, default_value = "toolforge.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Create an SSH tunnel to the replicas. Your SSH key must already be
    /// loaded in ssh-agent.
    Ssh(SshArgs),
    /// Print every database and the slice hosting it
    Dblist,
    /// Print the slice and local port serving a database
    Slice { database: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the runtime starts.
    let _sentry = init_logging(config.common.logging.as_ref());

    if let Err(e) = init_metrics(config.common.metrics.as_ref()) {
        tracing::error!(error = %e, "Failed to initialize metrics");
        return ExitCode::FAILURE;
    }

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli.command, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = logging.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(guard.is_some().then(|| sentry::integrations::tracing::layer()))
        .init();

    guard
}

fn init_metrics(metrics: Option<&MetricsConfig>) -> Result<(), CliError> {
    let Some(metrics) = metrics else {
        return Ok(());
    };

    let recorder = StatsdBuilder::from(metrics.statsd_host.clone(), metrics.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;
    replicas::metrics_defs::describe_metrics();

    Ok(())
}

async fn run(command: CliCommand, config: Config) -> Result<(), CliError> {
    let registry = Arc::new(ConfiguredRegistry::new(config.replicas.connections.clone()));
    let client = ReplicasClient::new(&config.replicas, registry);

    match command {
        CliCommand::Ssh(args) => ssh::run(&client, &config.ssh, args).await,
        CliCommand::Dblist => {
            let db_list = client.db_list().await?;
            let mut rows: Vec<_> = db_list.iter().collect();
            rows.sort_unstable();

            let mut out = std::io::stdout().lock();
            for (database, slice) in rows {
                writeln!(out, "{database}\t{slice}")?;
            }
            Ok(())
        }
        CliCommand::Slice { database } => {
            let slice = client.slice(&database).await?;
            let port = client.port_for_slice(&slice)?;
            println!("{slice}\t{port}");
            Ok(())
        }
    }
}
