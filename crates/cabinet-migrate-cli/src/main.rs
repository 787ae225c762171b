//! cabinet-migrate CLI - resumable document upload from a staging table.

use cabinet_migrate::error::EXIT_RUN_ABORTED;
use cabinet_migrate::{Config, MigrateError, Orchestrator, RunStatus, StagingRecord};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "cabinet-migrate")]
#[command(about = "Resumable document upload from a staging table into a file cabinet")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload every pending record
    Run {
        /// Override the pause before each upload attempt, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Dry run: list pending records without logging in or uploading
        #[arg(long)]
        dry_run: bool,
    },

    /// Show pending and uploaded record counts
    Status,

    /// Insert records from a JSON file into the staging table
    Stage {
        /// JSON file holding an array of staging records
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Create the staging table if it does not exist
    InitSchema,

    /// Test the staging database and the document service login
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run { delay_ms, dry_run } => {
            if let Some(ms) = delay_ms {
                config.upload.delay_ms = ms;
            }

            let cancel_token = setup_signal_handler();
            let orchestrator = Orchestrator::new(config)
                .await?
                .with_progress(cli.progress);

            let result = orchestrator.run(cancel_token, dry_run).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                let status_msg = match result.status {
                    RunStatus::Completed => "Upload run completed!",
                    RunStatus::DryRun => "Dry run completed!",
                    RunStatus::Cancelled => "Upload run cancelled.",
                    RunStatus::Aborted => "Upload run aborted: relogin failed.",
                };
                println!("\n{}", status_msg);
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Pending: {}", result.records_pending);
                println!("  Uploaded: {}", result.records_uploaded);
                println!("  Skipped (duplicate): {}", result.records_skipped);
                println!("  Failed: {}", result.records_failed);
                if result.records_not_attempted > 0 {
                    println!("  Not attempted: {}", result.records_not_attempted);
                }
                if result.relogins > 0 {
                    println!("  Relogins: {}", result.relogins);
                }
                if !result.failed_records.is_empty() {
                    println!("  Failed records: {:?}", result.failed_records);
                }
            }

            if result.status == RunStatus::Aborted {
                return Ok(ExitCode::from(EXIT_RUN_ABORTED));
            }
        }

        Commands::Status => {
            let orchestrator = Orchestrator::new(config).await?;
            let store = orchestrator.store();
            let summary = store.summary().await;
            store.close().await?;
            let summary = summary?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Staging table ({}):", store.backend_type());
                println!("  Total: {}", summary.total);
                println!("  Pending: {}", summary.pending);
                println!("  Uploaded: {}", summary.uploaded);
            }
        }

        Commands::Stage { input } => {
            let content = tokio::fs::read_to_string(&input).await?;
            let records: Vec<StagingRecord> = serde_json::from_str(&content)?;
            if let Some(record) = records.iter().find(|r| r.object_id.is_empty()) {
                return Err(MigrateError::Config(format!(
                    "staging record for {:?} has an empty object_id",
                    record.source_path
                )));
            }

            let orchestrator = Orchestrator::new(config).await?;
            let store = orchestrator.store();
            let inserted = store.stage(&records).await;
            store.close().await?;
            let inserted = inserted?;

            info!(
                "Staged {} of {} records from {:?}",
                inserted,
                records.len(),
                input
            );
            if cli.output_json {
                println!(
                    "{}",
                    serde_json::json!({ "read": records.len(), "inserted": inserted })
                );
            } else {
                println!(
                    "Staged {} new records ({} already present)",
                    inserted,
                    records.len() as u64 - inserted
                );
            }
        }

        Commands::InitSchema => {
            let orchestrator = Orchestrator::new(config).await?;
            let store = orchestrator.store();
            let created = store.ensure_schema().await;
            store.close().await?;
            created?;
            println!("Staging table is ready");
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.health_check().await;
            orchestrator.store().close().await?;
            let result = result?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Staging (PostgreSQL): {} ({}ms)",
                    if result.staging_connected { "OK" } else { "FAILED" },
                    result.staging_latency_ms
                );
                if let Some(ref err) = result.staging_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Document service: {} ({}ms)",
                    if result.remote_connected { "OK" } else { "FAILED" },
                    result.remote_latency_ms
                );
                if let Some(ref err) = result.remote_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity: {}", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format: {}", other)),
    }

    Ok(())
}

/// Cancel the returned token on SIGINT or SIGTERM. The run stops before the
/// next record; the record in flight is finished and persisted first.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            let mut stream = match signal(kind) {
                Ok(stream) => stream,
                Err(e) => {
                    eprintln!("Cannot install {} handler: {}", name, e);
                    return;
                }
            };
            stream.recv().await;
            eprintln!("\nReceived {}. Stopping after the current record...", name);
            token.cancel();
        });
    }

    cancel_token
}

/// Windows only delivers Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current record...");
            token.cancel();
        }
    });

    cancel_token
}
