use std::{path::PathBuf, process, sync::Arc};

use clap::Parser;
use content_purge::{
    config::PurgeConfig,
    observability,
    pipeline::Orchestrator,
    queue::{self, DeleteQueue},
    seed,
    service::{self, PurgeService},
    store::{self, ContentStore},
};
use tokio_util::sync::CancellationToken;

const DEFAULT_CONFIG_FILE: &str = "content-purge.toml";

/// CLI arguments for the content purge worker
#[derive(Parser, Debug)]
#[command(version, about = "Account content purge worker", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./content-purge.toml if it exists,
    /// otherwise built-in defaults with in-memory backends)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Poll the queue and process delete requests until shutdown (default)
    Run,
    /// Receive and process at most one delete request, then exit
    Once,
    /// Delete an account's content directly, bypassing the queue
    Purge {
        /// Account whose content records are deleted
        #[arg(short, long)]
        account: String,
        /// Seed this many records first. Useful with the in-memory store,
        /// which does not outlive the process.
        #[arg(long)]
        seed: Option<usize>,
    },
    /// Send a delete request for an account
    Enqueue {
        #[arg(short, long)]
        account: String,
    },
    /// Write generated content records for an account
    Seed {
        #[arg(short, long)]
        account: String,
        /// Number of records to write
        #[arg(short = 'n', long, default_value = "100")]
        count: usize,
    },
    /// Show enabled compile-time features
    Features,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let explicit_config = args.config.as_deref();

    match args.command {
        Some(Command::Features) => run_features(),
        Some(Command::Once) => run_once(explicit_config).await,
        Some(Command::Purge { account, seed }) => run_purge(explicit_config, &account, seed).await,
        Some(Command::Enqueue { account }) => run_enqueue(explicit_config, &account).await,
        Some(Command::Seed { account, count }) => run_seed(explicit_config, &account, count).await,
        Some(Command::Run) | None => run_worker(explicit_config).await,
    }
}

fn exit_with_error(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Resolve the config path. `None` means no file was found and built-in
/// defaults apply.
fn resolve_config_path(explicit_path: Option<&str>) -> Result<Option<PathBuf>, String> {
    if let Some(path) = explicit_path {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()));
        }
        return Ok(Some(path));
    }

    let cwd_config = PathBuf::from(DEFAULT_CONFIG_FILE);
    if cwd_config.exists() {
        return Ok(Some(cwd_config));
    }

    Ok(None)
}

/// Load the config and initialize tracing and metrics.
fn load_config(explicit_path: Option<&str>) -> PurgeConfig {
    let config_path = resolve_config_path(explicit_path).unwrap_or_else(|e| exit_with_error(e));

    let config = match &config_path {
        Some(path) => PurgeConfig::from_file(path).unwrap_or_else(|e| {
            exit_with_error(format!(
                "Failed to load config from {}: {}",
                path.display(),
                e
            ))
        }),
        None => PurgeConfig::default(),
    };

    if let Err(e) = observability::init_tracing(&config.observability.logging) {
        exit_with_error(e);
    }

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics: {e}");
    }

    match &config_path {
        Some(path) => tracing::info!(path = %path.display(), "Loaded configuration"),
        None => tracing::info!(
            "No {} found, using defaults with in-memory backends",
            DEFAULT_CONFIG_FILE
        ),
    }

    config
}

async fn build_store(config: &PurgeConfig) -> Arc<dyn ContentStore> {
    store::create_store(config)
        .await
        .unwrap_or_else(|e| exit_with_error(format!("Failed to initialize content store: {}", e)))
}

async fn build_queue(config: &PurgeConfig) -> Arc<dyn DeleteQueue> {
    queue::create_queue(config)
        .await
        .unwrap_or_else(|e| exit_with_error(format!("Failed to initialize delete queue: {}", e)))
}

async fn build_service(config: &PurgeConfig) -> Arc<PurgeService> {
    let store = build_store(config).await;
    let queue = build_queue(config).await;
    let orchestrator = Orchestrator::new(store, config);
    Arc::new(PurgeService::new(queue, orchestrator, &config.worker))
}

/// Run the queue polling loop until Ctrl+C or SIGTERM.
async fn run_worker(explicit_config_path: Option<&str>) {
    let config = load_config(explicit_config_path);
    let service = build_service(&config).await;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    service::start_purge_worker(service, config.worker.clone(), shutdown).await;
}

async fn run_once(explicit_config_path: Option<&str>) {
    let config = load_config(explicit_config_path);
    let service = build_service(&config).await;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    match service.handle_next(&shutdown).await {
        Ok(Some(report)) => print_report(&report),
        Ok(None) => println!("No delete request waiting"),
        Err(e) => exit_with_error(e),
    }
}

async fn run_purge(
    explicit_config_path: Option<&str>,
    account_id: &str,
    seed_count: Option<usize>,
) {
    let config = load_config(explicit_config_path);
    let store = build_store(&config).await;
    let schema = config.store.key_schema();

    if let Some(count) = seed_count
        && let Err(e) = seed::seed_account(store.as_ref(), &schema, account_id, count).await
    {
        exit_with_error(format!("Failed to seed records: {}", e));
    }

    let orchestrator = Orchestrator::new(store, &config);
    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    match orchestrator.process(&shutdown, account_id).await {
        Ok(report) => print_report(&report),
        Err(e) => exit_with_error(e),
    }
}

async fn run_enqueue(explicit_config_path: Option<&str>, account_id: &str) {
    let config = load_config(explicit_config_path);
    let queue = build_queue(&config).await;

    if let Err(e) = queue.send(account_id).await {
        exit_with_error(format!("Failed to send delete request: {}", e));
    }
    observability::metrics::record_queue_message("sent");
    println!("Enqueued delete request for account {account_id}");
}

async fn run_seed(explicit_config_path: Option<&str>, account_id: &str, count: usize) {
    let config = load_config(explicit_config_path);
    let store = build_store(&config).await;

    match seed::seed_account(store.as_ref(), &config.store.key_schema(), account_id, count).await {
        Ok(written) => println!("Seeded {written} records for account {account_id}"),
        Err(e) => exit_with_error(format!("Failed to seed records: {}", e)),
    }
}

fn print_report(report: &content_purge::pipeline::DeletionReport) {
    println!("Account:          {}", report.account_id);
    println!("Pages fetched:    {}", report.producer.pages_fetched);
    println!("Pages dropped:    {}", report.producer.pages_dropped);
    println!("Records found:    {}", report.producer.records_found);
    println!("Records deleted:  {}", report.records_deleted());
    println!("Batches deleted:  {}", report.batches_deleted());
    println!("Batches failed:   {}", report.batches_failed());
    println!("Duration:         {} ms", report.duration.as_millis());
    for failure in report.failures() {
        println!(
            "  worker {} skipped {} records: {}",
            failure.worker, failure.batch_size, failure.error
        );
    }
}

/// Print the enabled compile-time features
fn run_features() {
    let version = env!("CARGO_PKG_VERSION");

    let features: &[(&str, &str, bool)] = &[
        ("cli", "Runtime", cfg!(feature = "cli")),
        ("server", "Runtime", cfg!(feature = "server")),
        ("native-async", "Runtime", cfg!(feature = "native-async")),
        ("aws-sdk", "Backends", cfg!(feature = "aws-sdk")),
        ("dynamodb", "Backends", cfg!(feature = "dynamodb")),
        ("sqs", "Backends", cfg!(feature = "sqs")),
        ("prometheus", "Observability", cfg!(feature = "prometheus")),
    ];

    let profile = if cfg!(feature = "full") {
        "full"
    } else if cfg!(feature = "tiny") {
        "tiny"
    } else {
        "custom"
    };

    println!("content-purge v{version}\n");
    println!("Build profile: {profile}");
    match profile {
        "full" => println!("  (full = server + dynamodb, sqs, prometheus)\n"),
        "tiny" => println!("  (tiny = server with in-memory backends only)\n"),
        _ => println!(),
    }

    println!("Compile-time features:");

    let mut current_group = "";
    for &(name, group, enabled) in features {
        if group != current_group {
            if !current_group.is_empty() {
                println!();
            }
            println!("  {group}:");
            current_group = group;
        }
        let status = if enabled { "enabled" } else { "disabled" };
        println!("    {name:<16} {status}");
    }
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping purge worker");
    shutdown.cancel();
}
