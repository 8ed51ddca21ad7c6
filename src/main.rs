use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use panelist::orchestrator::event_channel;
use panelist::queue::{JsonFileStorage, OfflineMessageQueue, Outbox};
use panelist::util::paths;
use panelist::{
    ExecuteOptions, ExperimentOrchestrator, FileConfigLoader, InMemoryRecordStore,
    OrchestratorEvent, RetryOptions, Settings, StreamingExperimentClient,
};

#[derive(Parser)]
#[command(name = "panelist", about = "Run streaming persona-simulation experiments")]
struct Cli {
    /// Override the data directory (default: ~/.panelist)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one experiment end to end
    Run {
        /// Experiment config: a .json file or a name under <project-root>/experiments
        #[arg(long)]
        config: String,

        /// Project root directory (artifact destination, git repository)
        #[arg(long, default_value = ".")]
        project_root: PathBuf,

        /// Project id in the system-of-record
        #[arg(long, default_value = "local")]
        project: String,

        /// Linked decision id to advance alongside the experiment
        #[arg(long)]
        decision: Option<String>,

        /// Override the compute service endpoint
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Inspect or drain the offline message queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Show queued messages
    Status,
    /// Deliver queued messages to the record store
    Flush,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    paths::init_data_dir(cli.data_dir.clone());

    // Log to file (~/.panelist/logs/panelist.log)
    fs::create_dir_all(paths::logs_dir())?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(paths::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();

    let settings = Settings::load(&paths::settings_path());

    match cli.command {
        Command::Run {
            config,
            project_root,
            project,
            decision,
            endpoint,
        } => run_experiment(settings, config, project_root, project, decision, endpoint).await,
        Command::Queue { action } => queue_command(settings, action).await,
    }
}

async fn run_experiment(
    settings: Settings,
    config: String,
    project_root: PathBuf,
    project: String,
    decision: Option<String>,
    endpoint: Option<String>,
) -> Result<()> {
    let endpoint = endpoint.unwrap_or_else(|| settings.endpoint.clone());

    let client = Arc::new(
        StreamingExperimentClient::new(endpoint).with_timeout(settings.stream_timeout),
    );
    let store = Arc::new(InMemoryRecordStore::new());
    let loader = Arc::new(FileConfigLoader::new(project_root.join("experiments")));
    let outbox = Arc::new(Outbox::new(build_queue(&settings), store.clone()));

    let (events_tx, mut events_rx) = event_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                OrchestratorEvent::PersonaCompleted {
                    response,
                    completed,
                    total,
                    ..
                } => {
                    println!(
                        "[{completed}/{total}] {} ({}) sentiment {:+.2}",
                        response.persona_name, response.archetype_name, response.sentiment
                    );
                }
                OrchestratorEvent::ExperimentCompleted {
                    experiment_id,
                    artifact_path,
                    metrics,
                } => {
                    println!("Experiment {experiment_id} completed");
                    if let Some(path) = artifact_path {
                        println!("Results written to {path}");
                    }
                    if let Some(metrics) = metrics {
                        println!(
                            "{} responses, avg sentiment {:+.3}",
                            metrics.successful_responses, metrics.avg_sentiment
                        );
                    }
                }
                OrchestratorEvent::ExperimentFailed {
                    experiment_id,
                    message,
                } => {
                    eprintln!("Experiment {experiment_id} failed: {message}");
                }
            }
        }
    });

    let orchestrator = ExperimentOrchestrator::new(client, store, loader, events_tx)
        .with_retry_options(
            RetryOptions::default()
                .with_max_retries(settings.max_retries)
                .with_initial_delay(settings.initial_retry_delay),
        )
        .with_outbox(outbox);

    let result = orchestrator
        .execute(ExecuteOptions {
            config_ref: config,
            project_id: project,
            project_root,
            decision_id: decision,
        })
        .await;

    // Dropping the orchestrator closes the event channel so the printer drains
    drop(orchestrator);
    let _ = printer.await;

    match result {
        Ok(state) => {
            tracing::info!(
                experiment_id = %state.experiment_id,
                duration_s = state.duration_seconds(),
                "Run finished"
            );
            Ok(())
        }
        Err(error) => {
            let advice = panelist::classify(&error);
            eprintln!("{}", advice.user_message);
            Err(error.into())
        }
    }
}

async fn queue_command(settings: Settings, action: QueueAction) -> Result<()> {
    let store = Arc::new(InMemoryRecordStore::new());
    let outbox = Outbox::new(build_queue(&settings), store);

    match action {
        QueueAction::Status => {
            let pending = outbox.pending();
            if pending.is_empty() {
                println!("Offline queue is empty");
            } else {
                println!("{} queued message(s):", pending.len());
                for entry in pending {
                    println!(
                        "  {}  {}  retries={}  {}",
                        entry.id,
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.retries,
                        entry.last_error.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        QueueAction::Flush => {
            let delivered = outbox.flush().await;
            println!("Delivered {delivered} queued message(s)");
        }
    }
    Ok(())
}

fn build_queue(settings: &Settings) -> OfflineMessageQueue {
    OfflineMessageQueue::new(
        Box::new(JsonFileStorage::new(paths::queue_path())),
        settings.queue_capacity,
        chrono::Duration::days(settings.queue_ttl_days),
    )
}
