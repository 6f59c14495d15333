//! hanja-pipeline - Hanja dictionary batch pipeline
//!
//! Builds the dictionary (`run`, `stage`), supports the review workflow
//! (`review`), answers lookups (`lookup`) and serves the read API (`serve`).
//!
//! Exit code 0 on success, 1 when any stage failed fatally.

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hanja_common::config::{ConfigOverrides, ErrorMode, LoggingConfig, PipelineConfig};
use hanja_common::db::init_database;
use hanja_common::Element;
use hanja_pipeline::db::{self, DictionaryEntry, Page, Paged};
use hanja_pipeline::types::StageKind;
use hanja_pipeline::workflow::StageStatus;
use hanja_pipeline::{AppState, Orchestrator, RunOptions, RunSummary};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for hanja-pipeline
#[derive(Parser, Debug)]
#[command(name = "hanja-pipeline")]
#[command(about = "Hanja dictionary ingestion, conflict resolution and lookup")]
#[command(version)]
struct Cli {
    /// Configuration file (falls back to HANJA_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dictionary database path
    #[arg(long, global = true, env = "HANJA_DATABASE")]
    database: Option<PathBuf>,

    /// Directory for stage batches, results, checkpoint and report
    #[arg(long, global = true, env = "HANJA_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline
    Run {
        /// Record stage failures and keep going with empty input
        #[arg(long)]
        continue_on_error: bool,

        /// Reuse the existing output of this stage (repeatable)
        #[arg(long, value_enum)]
        skip: Vec<StageKind>,

        /// Restart after the last completed stage in the checkpoint
        #[arg(long)]
        resume: bool,
    },

    /// Run a single stage from the previous stage's batch file
    Stage {
        #[arg(value_enum)]
        name: StageKind,
    },

    /// Review queue and manual element decisions
    Review {
        #[command(subcommand)]
        action: ReviewCommand,
    },

    /// Query the dictionary
    Lookup {
        #[command(subcommand)]
        query: LookupCommand,
    },

    /// Serve the HTTP read API
    Serve {
        #[arg(long, default_value = "127.0.0.1:5780", env = "HANJA_LISTEN")]
        listen: SocketAddr,
    },
}

#[derive(Subcommand, Debug)]
enum ReviewCommand {
    /// List entries awaiting review
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = Page::DEFAULT_PER_PAGE)]
        per_page: u32,
    },
    /// Set an entry's element manually
    Set { character: String, element: String },
}

#[derive(Subcommand, Debug)]
enum LookupCommand {
    /// Look up one character (counts as a use)
    Char { character: String },
    /// List entries of one element
    Element {
        element: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = Page::DEFAULT_PER_PAGE)]
        per_page: u32,
    },
    /// Find entries by primary or alternate reading
    Reading {
        reading: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = Page::DEFAULT_PER_PAGE)]
        per_page: u32,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    config.apply_overrides(ConfigOverrides {
        database_path: cli.database.clone(),
        work_dir: cli.work_dir.clone(),
        log_level: cli.log_level.clone(),
        error_mode: None,
    });

    init_tracing(&config.logging)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.database_path.display(),
        work_dir = %config.work_dir.display(),
        "hanja-pipeline starting"
    );

    let pool = init_database(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    let exit = match cli.command {
        Command::Run {
            continue_on_error,
            skip,
            resume,
        } => {
            let error_mode = if continue_on_error {
                ErrorMode::Continue
            } else {
                config.error_mode
            };
            let orchestrator = Orchestrator::new(config, pool.clone());
            let summary = orchestrator
                .run_all(RunOptions {
                    error_mode,
                    skip,
                    resume,
                })
                .await?;
            print_summary(&summary);
            exit_code(&summary)
        }
        Command::Stage { name } => {
            let orchestrator = Orchestrator::new(config, pool.clone());
            let summary = orchestrator.run_single(name).await?;
            print_summary(&summary);
            exit_code(&summary)
        }
        Command::Review { action } => {
            review(&pool, action).await?;
            ExitCode::SUCCESS
        }
        Command::Lookup { query } => {
            lookup(&pool, query).await?;
            ExitCode::SUCCESS
        }
        Command::Serve { listen } => {
            serve(pool.clone(), listen).await?;
            ExitCode::SUCCESS
        }
    };

    pool.close().await;
    Ok(exit)
}

/// Initialize tracing: RUST_LOG wins, else the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "hanja_pipeline={level},hanja_common={level},tower_http=info",
            level = logging.level
        ))
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
                .init();
        }
        None => {
            registry.with(fmt::layer().with_writer(std::io::stderr)).init();
        }
    }
    Ok(())
}

fn exit_code(summary: &RunSummary) -> ExitCode {
    if summary.exit_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn print_summary(summary: &RunSummary) {
    println!("Run {}", summary.run_id);
    for outcome in &summary.outcomes {
        let status = match outcome.status {
            StageStatus::Completed => "ok",
            StageStatus::Reused => "reused",
            StageStatus::Failed => "FAILED",
        };
        println!(
            "  {:<10} {:<7} processed={:<6} succeeded={:<6} errors={:<5} warnings={:<5} {}ms",
            outcome.stage.as_str(),
            status,
            outcome.result.processed_count,
            outcome.result.success_count,
            outcome.result.error_count,
            outcome.result.warnings.len(),
            outcome.result.metrics.processing_time_ms
        );
    }
    if let Some(stage) = summary.aborted_at {
        println!("Aborted at stage '{}'", stage);
    }
    if let Some(report) = &summary.report {
        let q = &report.quality;
        println!(
            "Quality: completeness {:.1}%, accuracy {:.1}%, validity {:.1}%, consistency {:.1}%",
            q.completeness * 100.0,
            q.accuracy * 100.0,
            q.validity * 100.0,
            q.consistency * 100.0
        );
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_page(page: &Paged<DictionaryEntry>) {
    println!(
        "Page {} ({} per page), {} total",
        page.page, page.per_page, page.total
    );
    for entry in &page.items {
        let readings: Vec<&str> = entry.readings.iter().map(|r| r.text.as_str()).collect();
        println!(
            "  {}  {:<8} score={:<3} {:<12} {:<6} {}",
            entry.character,
            entry.element.map(|e| e.as_str()).unwrap_or("-"),
            entry.evidence_score,
            entry.review_status.as_str(),
            entry.decided_by.as_str(),
            readings.join(",")
        );
    }
}

fn parse_element(text: &str) -> Result<Element> {
    text.trim()
        .to_lowercase()
        .parse::<Element>()
        .map_err(anyhow::Error::msg)
}

async fn review(pool: &SqlitePool, action: ReviewCommand) -> Result<()> {
    match action {
        ReviewCommand::List { page, per_page } => {
            let page = db::review_queue(pool, Page::new(page, per_page)).await?;
            print_page(&page);
        }
        ReviewCommand::Set { character, element } => {
            let element = parse_element(&element)?;
            let entry = db::manual_resolve(pool, &character, element).await?;
            print_json(&entry)?;
        }
    }
    Ok(())
}

async fn lookup(pool: &SqlitePool, query: LookupCommand) -> Result<()> {
    match query {
        LookupCommand::Char { character } => match db::get_entry(pool, &character, true).await? {
            Some(entry) => print_json(&entry)?,
            None => anyhow::bail!("No dictionary entry for '{}'", character),
        },
        LookupCommand::Element {
            element,
            page,
            per_page,
        } => {
            let element = parse_element(&element)?;
            let page = db::list_by_element(pool, element, Page::new(page, per_page)).await?;
            print_page(&page);
        }
        LookupCommand::Reading {
            reading,
            page,
            per_page,
        } => {
            let page = db::find_by_reading(pool, &reading, Page::new(page, per_page)).await?;
            print_page(&page);
        }
    }
    Ok(())
}

async fn serve(pool: SqlitePool, listen: SocketAddr) -> Result<()> {
    let app = hanja_pipeline::build_router(AppState::new(pool));

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind to {}", listen))?;
    info!("Listening on http://{}", listen);
    info!("Health check: http://{}/health", listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
