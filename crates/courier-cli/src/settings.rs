//! CLI 設定の読み込み
//!
//! 優先順位（後勝ち）:
//! 1. 組み込みのデフォルト
//! 2. 設定ファイル（TOML、なくてもよい）
//! 3. `COURIER__` で始まる環境変数（ネストは `__` 区切り）
//!
//! 例: `COURIER__ORCHESTRATOR__CHAIN=mina:mainnet`, `COURIER__INDEXER_API_KEY=...`

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use courier_core::OrchestratorConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub orchestrator: OrchestratorConfig,

    /// Ledger node GraphQL endpoint (primary oracle and broadcaster).
    pub graphql_url: String,

    pub indexer_url: String,

    /// The secondary oracle is only wired when a key is configured.
    pub indexer_api_key: Option<String>,

    /// Holds the durable KV file and the archive directory.
    pub state_dir: PathBuf,

    pub workers: usize,
    pub json_logs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            graphql_url: "https://api.minascan.io/node/devnet/v1/graphql".to_string(),
            indexer_url: courier_core::impls::DEFAULT_INDEXER_URL.to_string(),
            indexer_api_key: None,
            state_dir: PathBuf::from(".courier"),
            workers: 1,
            json_logs: false,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_config(
            Config::builder()
                .add_source(File::from(path.to_path_buf()).required(false))
                .add_source(
                    Environment::with_prefix("COURIER")
                        .prefix_separator("__")
                        .separator("__")
                        .try_parsing(true),
                ),
        )
    }

    fn from_config(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    pub fn kv_path(&self) -> PathBuf {
        self.state_dir.join("kv.json")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.state_dir.join("archive")
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.state_dir.join("artifacts")
    }
}
