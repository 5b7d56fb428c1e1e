//! OrchestratorBuilder - ports のワイヤリング
//!
//! # Fail-fast 設計
//! - 必須ポートが欠けていれば build() で BuildError を返す（不足分をまとめて列挙）
//! - 設定値の検証もここで行う
//! - Clock / IdGenerator は省略時にシステム時刻・ULID を使う

use std::sync::Arc;

use crate::app::guard::SingleFlightGuard;
use crate::app::monitor::MonitorLoop;
use crate::app::orchestrator::Orchestrator;
use crate::app::rearm::MonitorArming;
use crate::app::resolver::StatusResolver;
use crate::app::settle::Settler;
use crate::app::submission::SubmissionChannel;
use crate::config::{MonitorKeys, OrchestratorConfig};
use crate::domain::CourierError;
use crate::ports::{
    ArtifactStore, Broadcaster, Clock, FileArchive, IdGenerator, KeyValueStore, MetadataSink,
    PendingStore, ResourceInfo, StatusOracle, SystemClock, TaskQueue, UlidGenerator,
};

/// BuildError はオーケストレータ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing ports: {0:?}. These collaborators are required but were not provided.")]
    MissingPorts(Vec<&'static str>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] CourierError),
}

/// # 使用例
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new(config)
///     .store(kv)
///     .pending(pending)
///     .queue(queue)
///     .oracle(node.clone())
///     .oracle(indexer)
///     .broadcaster(node)
///     .sink(sink)
///     .archive(archive)
///     .build()?;
/// ```
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    pending: Option<Arc<dyn PendingStore>>,
    queue: Option<Arc<dyn TaskQueue>>,
    oracles: Vec<Arc<dyn StatusOracle>>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    sink: Option<Arc<dyn MetadataSink>>,
    archive: Option<Arc<dyn FileArchive>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    resource_info: Option<Arc<dyn ResourceInfo>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl OrchestratorBuilder {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            store: None,
            pending: None,
            queue: None,
            oracles: Vec::new(),
            broadcaster: None,
            sink: None,
            archive: None,
            artifacts: None,
            resource_info: None,
            clock: None,
            ids: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn pending(mut self, pending: Arc<dyn PendingStore>) -> Self {
        self.pending = Some(pending);
        self
    }

    pub fn queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Oracles are consulted in the order they are added.
    pub fn oracle(mut self, oracle: Arc<dyn StatusOracle>) -> Self {
        self.oracles.push(oracle);
        self
    }

    pub fn broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn MetadataSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn archive(mut self, archive: Arc<dyn FileArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn artifact_store(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn resource_info(mut self, resource_info: Arc<dyn ResourceInfo>) -> Self {
        self.resource_info = Some(resource_info);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<Orchestrator, BuildError> {
        let mut missing = Vec::new();
        if self.store.is_none() {
            missing.push("store");
        }
        if self.pending.is_none() {
            missing.push("pending");
        }
        if self.queue.is_none() {
            missing.push("queue");
        }
        if self.oracles.is_empty() {
            missing.push("oracle");
        }
        if self.broadcaster.is_none() {
            missing.push("broadcaster");
        }
        if self.sink.is_none() {
            missing.push("sink");
        }
        if self.archive.is_none() {
            missing.push("archive");
        }

        let (Some(store), Some(pending), Some(queue), Some(broadcaster), Some(sink), Some(archive)) = (
            self.store,
            self.pending,
            self.queue,
            self.broadcaster,
            self.sink,
            self.archive,
        ) else {
            return Err(BuildError::MissingPorts(missing));
        };
        if !missing.is_empty() {
            return Err(BuildError::MissingPorts(missing));
        }

        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));
        let keys = MonitorKeys::new(config.lineage.clone());

        let guard = SingleFlightGuard::new(
            store.clone(),
            clock.clone(),
            keys.clone(),
            config.lock_staleness(),
        );
        let arming = Arc::new(MonitorArming::new(
            store.clone(),
            queue.clone(),
            ids,
            keys.clone(),
            config.monitor_max_attempts,
            &config.lineage,
            config.owner_id.clone(),
        ));
        let monitor = MonitorLoop {
            store,
            queue,
            pending: pending.clone(),
            resolver: StatusResolver::new(self.oracles, clock.clone(), config.replace_after()),
            settler: Settler::new(
                pending.clone(),
                sink.clone(),
                archive.clone(),
                self.resource_info,
                clock.clone(),
            ),
            arming: arming.clone(),
            clock: clock.clone(),
            keys,
            chain: config.chain,
            duplicate_window: config.duplicate_window(),
            local_mode: config.local_mode,
        };
        let submission = SubmissionChannel {
            broadcaster,
            artifacts: self.artifacts,
            sink,
            archive,
            pending,
            arming: arming.clone(),
            clock,
            chain: config.chain,
            local_mode: config.local_mode,
            timeout: config.submit_timeout(),
            backoff: config.broadcast_backoff(),
        };

        Ok(Orchestrator::new(config, guard, monitor, submission, arming))
    }
}
