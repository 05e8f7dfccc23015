//! Command-line entry point: run batches, retry failures, inspect the
//! review queue. Exit code 0 on completion, 1 on unhandled error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nutrilens::config::{self, PipelineConfig};
use nutrilens::pipeline::batch::{BatchOrchestrator, RunOptions, WorkItem};
use nutrilens::pipeline::extract::ExtractionClient;
use nutrilens::pipeline::providers::{
    DocumentPayload, OllamaVision, OpenAiVision, VisionProvider,
};
use nutrilens::pipeline::rate_limit::RateLimiter;
use nutrilens::pipeline::retry::RetryPolicy;
use nutrilens::review::ReviewStatus;
use nutrilens::store::{ExtractionStore, SqliteStore};

#[derive(Parser)]
#[command(name = "nutrilens", version, about = "Extract structured records from scanned product labels")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a batch extraction over a directory of label scans
    Run {
        /// Directory containing label images (png/jpg)
        input_dir: PathBuf,
        /// Process at most this many eligible items
        #[arg(long)]
        limit: Option<usize>,
        /// Items started concurrently per window
        #[arg(long)]
        concurrency: Option<usize>,
        /// Skip items already extracted successfully
        #[arg(long)]
        skip_existing: bool,
        /// Cross-check with a second local model and queue disagreements
        #[arg(long)]
        two_providers: bool,
    },
    /// Re-drive previously failed items, one at a time
    Retry {
        /// Directory containing label images (png/jpg)
        input_dir: PathBuf,
    },
    /// Inspect or update the review queue
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },
}

#[derive(Subcommand)]
enum ReviewAction {
    /// List queued items, highest priority first
    List {
        /// Filter by status (pending, in_progress, resolved, dismissed)
        #[arg(long)]
        status: Option<String>,
    },
    /// Mark an item's review as resolved
    Resolve { item_id: String },
    /// Dismiss an item's review
    Dismiss { item_id: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Nutrilens starting v{}", config::APP_VERSION);

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Run failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(SqliteStore::open(&config::database_path())?);
    let pipeline_config = PipelineConfig::default();

    match cli.command {
        Command::Run {
            input_dir,
            limit,
            concurrency,
            skip_existing,
            two_providers,
        } => {
            let items = scan_input_dir(&input_dir)?;
            if items.is_empty() {
                println!("No label images found in {}", input_dir.display());
                return Ok(());
            }

            let orchestrator =
                build_orchestrator(&pipeline_config, store.clone(), two_providers)?;
            install_shutdown_handler(&orchestrator);

            let options = RunOptions {
                skip_existing,
                concurrency: concurrency.unwrap_or(pipeline_config.concurrency),
                limit,
            };
            let summary = orchestrator.run_all(items, &options).await?;
            println!("{}", summary.report());
        }
        Command::Retry { input_dir } => {
            let items = scan_input_dir(&input_dir)?;
            let orchestrator = build_orchestrator(&pipeline_config, store.clone(), false)?;
            install_shutdown_handler(&orchestrator);

            let summary = orchestrator.retry_failed(&items).await?;
            println!("{}", summary.report());
        }
        Command::Review { action } => match action {
            ReviewAction::List { status } => {
                let status = match status.as_deref() {
                    Some(s) => Some(
                        ReviewStatus::from_str(s)
                            .ok_or_else(|| format!("unknown review status: {s}"))?,
                    ),
                    None => None,
                };
                let entries = store.list_reviews(status)?;
                if entries.is_empty() {
                    println!("Review queue is empty");
                } else {
                    for entry in entries {
                        println!(
                            "{:<24} priority {:>3}  {:>2} high / {:>2} medium  [{}]",
                            entry.item_id,
                            entry.priority,
                            entry.high_count,
                            entry.medium_count,
                            entry.status,
                        );
                    }
                }
            }
            ReviewAction::Resolve { item_id } => {
                store.set_review_status(&item_id, ReviewStatus::Resolved)?;
                println!("Marked {item_id} as resolved");
            }
            ReviewAction::Dismiss { item_id } => {
                store.set_review_status(&item_id, ReviewStatus::Dismissed)?;
                println!("Dismissed {item_id}");
            }
        },
    }

    Ok(())
}

fn build_orchestrator(
    config: &PipelineConfig,
    store: Arc<dyn ExtractionStore>,
    two_providers: bool,
) -> Result<BatchOrchestrator, Box<dyn std::error::Error>> {
    let policy = RetryPolicy::from_config(config);

    let primary: Arc<dyn VisionProvider> = Arc::new(OpenAiVision::from_env(
        &config.primary_model,
        config.request_timeout_secs,
    )?);
    let primary_client = Arc::new(ExtractionClient::new(
        primary.clone(),
        Arc::new(RateLimiter::per_minute(
            primary.name(),
            config.requests_per_minute,
        )),
        policy,
    ));

    let secondary_client = if two_providers {
        let secondary: Arc<dyn VisionProvider> =
            Arc::new(OllamaVision::default_local(&config.secondary_model));
        Some(Arc::new(ExtractionClient::new(
            secondary.clone(),
            Arc::new(RateLimiter::per_minute(
                secondary.name(),
                config.requests_per_minute,
            )),
            policy,
        )))
    } else {
        None
    };

    Ok(BatchOrchestrator::new(primary_client, secondary_client, store))
}

/// Ctrl-C requests an orderly stop: the current window finishes, no new
/// window starts.
fn install_shutdown_handler(orchestrator: &BatchOrchestrator) {
    let flag = orchestrator.shutdown_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received; finishing current window");
            flag.request();
        }
    });
}

/// Build work items from the image files in a directory. The file stem is
/// the item id, so re-runs and retries line up with stored outcomes.
fn scan_input_dir(dir: &Path) -> Result<Vec<WorkItem>, std::io::Error> {
    let mut items = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let media_type = match ext.to_lowercase().as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            _ => continue,
        };
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let bytes = std::fs::read(&path)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        items.push(WorkItem {
            id: stem.to_string(),
            payload: DocumentPayload::from_page(encoded, media_type),
        });
    }
    items.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(items)
}
