//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryKvStore / FileKvStore**: 永続 KV（テスト用 / ファイルロックで複数プロセス共有可）
//! - **KvPendingStore**: KV の中に置く pending セット
//! - **InMemoryTaskQueue**: プロセス内の定期配送キュー
//! - **GraphqlNode**: 台帳ノード（一次オラクル + ブロードキャスタ）
//! - **IndexerOracle**: インデクサ（二次オラクル）
//! - **DirFileArchive / DirArtifactStore / LogMetadataSink**: ローカル運用向けの出力先
//! - **Scripted\***, **Recording\***, **Memory\***: テスト用

pub mod archive;
pub mod file_kv;
pub mod graphql;
pub mod indexer;
pub mod kv_pending;
pub mod log_sink;
pub mod memory;
pub mod scripted;
pub mod task_queue;

pub use self::archive::{DirArtifactStore, DirFileArchive};
pub use self::file_kv::FileKvStore;
pub use self::graphql::GraphqlNode;
pub use self::indexer::{DEFAULT_INDEXER_URL, IndexerOracle};
pub use self::kv_pending::KvPendingStore;
pub use self::log_sink::LogMetadataSink;
pub use self::memory::{InMemoryKvStore, MemoryArtifactStore, MemoryFileArchive, RecordingMetadataSink};
pub use self::scripted::{ScriptedBroadcaster, ScriptedOracle, StaticResourceInfo};
pub use self::task_queue::InMemoryTaskQueue;
