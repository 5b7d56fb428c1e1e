mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use courier_core::domain::SubmissionRequest;
use courier_core::impls::{
    DirArtifactStore, DirFileArchive, FileKvStore, GraphqlNode, InMemoryTaskQueue, IndexerOracle, KvPendingStore,
    LogMetadataSink,
};
use courier_core::ports::{IdGenerator, KeyValueStore, PendingStore, SystemClock, UlidGenerator};
use courier_core::{Orchestrator, OrchestratorBuilder, WorkerGroup};
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "Broadcasts signed transactions and follows them to settlement")]
struct Cli {
    /// TOML settings file; missing is fine.
    #[arg(short, long, default_value = "courier.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the monitor workers until ctrl-c.
    Monitor,
    /// Submit one signed transaction described by a JSON request file.
    Submit {
        file: PathBuf,
        /// Build the result without broadcasting.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the pending set of the configured chain.
    Pending,
}

/// Orchestrator plus the adapters the commands touch directly.
struct Wiring {
    orchestrator: Arc<Orchestrator>,
    queue: Arc<InMemoryTaskQueue>,
    pending: Arc<KvPendingStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    init_tracing(settings.json_logs);

    let wiring = wire(&settings).await?;
    match cli.command {
        Command::Monitor => monitor(&settings, wiring).await,
        Command::Submit { file, dry_run } => submit(wiring, file, dry_run).await,
        Command::Pending => {
            let records = wiring.pending.list(settings.orchestrator.chain).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("courier=info,courier_core=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn wire(settings: &Settings) -> anyhow::Result<Wiring> {
    let config = settings.orchestrator.clone();

    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileKvStore::open(settings.kv_path())
            .await
            .with_context(|| format!("opening {}", settings.kv_path().display()))?,
    );
    let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(SystemClock));
    let pending = Arc::new(KvPendingStore::new(store.clone(), ids.clone(), config.lineage.clone()));
    let queue = Arc::new(InMemoryTaskQueue::new(ids.clone(), config.monitor_interval()));
    let node = Arc::new(GraphqlNode::new(settings.graphql_url.clone()));

    let mut builder = OrchestratorBuilder::new(config)
        .store(store)
        .pending(pending.clone())
        .queue(queue.clone())
        .oracle(node.clone())
        .broadcaster(node)
        .sink(Arc::new(LogMetadataSink))
        .archive(Arc::new(DirFileArchive::new(settings.archive_dir())))
        .artifact_store(Arc::new(DirArtifactStore::new(settings.artifact_dir())))
        .ids(ids);
    match &settings.indexer_api_key {
        Some(key) => {
            builder = builder.oracle(Arc::new(IndexerOracle::new(settings.indexer_url.clone(), key.clone())));
        }
        None => tracing::warn!("no indexer api key configured, using the ledger node only"),
    }

    Ok(Wiring {
        orchestrator: Arc::new(builder.build()?),
        queue,
        pending,
    })
}

async fn monitor(settings: &Settings, wiring: Wiring) -> anyhow::Result<()> {
    let chain = settings.orchestrator.chain;

    // the in-process queue starts empty, so resume any session left by a previous run
    let waiting = wiring.pending.list(chain).await?.len();
    if waiting > 0 {
        let (task_id, token) = wiring.orchestrator.arm_monitor().await?;
        tracing::info!(%chain, waiting, %task_id, %token, "resuming monitor for pending transactions");
    }

    let workers = settings.workers.max(1);
    tracing::info!(%chain, workers, "starting monitor workers");
    let group = WorkerGroup::spawn(workers, wiring.queue.clone(), wiring.orchestrator.clone());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    wiring.queue.close().await;
    group.shutdown_and_join().await;
    Ok(())
}

async fn submit(wiring: Wiring, file: PathBuf, dry_run: bool) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let mut request: SubmissionRequest =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
    if dry_run {
        request.send = false;
    }

    let result = wiring.orchestrator.submit(request).await?;
    println!("{}", result.to_json()?);
    if result.hash.is_some() && !wiring.queue.active_ids().await.is_empty() {
        tracing::info!("transaction is pending, run `courier monitor` to follow it to settlement");
    }
    Ok(())
}
