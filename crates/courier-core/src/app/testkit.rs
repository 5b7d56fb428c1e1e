//! In-memory wiring shared by the app tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::app::{Orchestrator, OrchestratorBuilder};
use crate::config::OrchestratorConfig;
use crate::domain::transaction::sample_transaction;
use crate::domain::{
    Chain, Invocation, MonitorArgs, Operation, RecordId, SessionToken, SignedTransaction,
    SubmissionRequest, TaskId, TaskKind,
};
use crate::impls::{
    InMemoryKvStore, InMemoryTaskQueue, KvPendingStore, MemoryArtifactStore, MemoryFileArchive,
    RecordingMetadataSink, ScriptedBroadcaster, ScriptedOracle, StaticResourceInfo,
};
use crate::ports::{Clock, FixedClock, IdGenerator, KeyValueStore, PendingStore, UlidGenerator};

pub(crate) const LINEAGE: &str = "nft-agent";

pub(crate) struct Harness {
    pub clock: FixedClock,
    pub kv: InMemoryKvStore,
    pub pending: Arc<KvPendingStore>,
    pub queue: Arc<InMemoryTaskQueue>,
    pub node: ScriptedOracle,
    pub indexer: ScriptedOracle,
    pub broadcaster: ScriptedBroadcaster,
    pub sink: RecordingMetadataSink,
    pub archive: MemoryFileArchive,
    pub artifacts: MemoryArtifactStore,
    pub orchestrator: Orchestrator,
}

pub(crate) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub(crate) fn harness() -> Harness {
    harness_with(OrchestratorConfig::for_chain(Chain::MinaDevnet))
}

pub(crate) fn harness_with(config: OrchestratorConfig) -> Harness {
    let clock = FixedClock::new(start_time());
    let kv = InMemoryKvStore::new();
    let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));
    let pending = Arc::new(KvPendingStore::new(Arc::new(kv.clone()), ids.clone(), LINEAGE));
    let queue = Arc::new(InMemoryTaskQueue::new(ids.clone(), config.monitor_interval()));
    let node = ScriptedOracle::new("node");
    let indexer = ScriptedOracle::new("indexer");
    let broadcaster = ScriptedBroadcaster::new();
    let sink = RecordingMetadataSink::new();
    let archive = MemoryFileArchive::new();
    let artifacts = MemoryArtifactStore::new();

    let orchestrator = OrchestratorBuilder::new(config)
        .store(Arc::new(kv.clone()))
        .pending(pending.clone())
        .queue(queue.clone())
        .oracle(Arc::new(node.clone()))
        .oracle(Arc::new(indexer.clone()))
        .broadcaster(Arc::new(broadcaster.clone()))
        .sink(Arc::new(sink.clone()))
        .archive(Arc::new(archive.clone()))
        .artifact_store(Arc::new(artifacts.clone()))
        .resource_info(Arc::new(StaticResourceInfo::new(None)))
        .clock(Arc::new(clock.clone()))
        .ids(ids)
        .build()
        .unwrap();

    Harness {
        clock,
        kv,
        pending,
        queue,
        node,
        indexer,
        broadcaster,
        sink,
        archive,
        artifacts,
        orchestrator,
    }
}

pub(crate) fn request(name: &str) -> SubmissionRequest {
    SubmissionRequest {
        transaction: SignedTransaction::new(r#"{"feePayer":{"body":{}}}"#),
        name: name.to_string(),
        operation: Operation::Mint,
        collection_address: "B62qcollection".to_string(),
        nft_address: Some("B62qnft".to_string()),
        sender: "B62qsender".to_string(),
        price: None,
        job_id: "job-1".to_string(),
        metadata: serde_json::json!({ "collectionName": "Kittens" }),
        content_hash: None,
        send: true,
    }
}

impl Harness {
    /// Insert a pending record received `age` before the current clock time.
    pub async fn insert(&self, hash: &str, chain: Chain, age: Duration) -> RecordId {
        let received = self.clock.now() - chrono::Duration::from_std(age).unwrap();
        self.pending.insert(sample_transaction(hash, chain), received).await.unwrap()
    }

    pub async fn pending_hashes(&self, chain: Chain) -> Vec<String> {
        let mut hashes: Vec<_> = self
            .pending
            .list(chain)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.transaction.hash)
            .collect();
        hashes.sort();
        hashes
    }

    /// Arm a session and return the invocation the queue would deliver for it.
    pub async fn armed_invocation(&self) -> (Invocation, SessionToken) {
        let (task_id, token) = self.orchestrator.arm_monitor().await.unwrap();
        (self.invocation(task_id, token), token)
    }

    pub fn invocation(&self, task_id: TaskId, token: SessionToken) -> Invocation {
        Invocation::new(
            task_id,
            MonitorArgs::KIND,
            serde_json::to_value(MonitorArgs { token }).unwrap(),
        )
    }

    pub async fn kv_get(&self, key: &str) -> Option<String> {
        self.kv.get(key).await.unwrap()
    }
}
