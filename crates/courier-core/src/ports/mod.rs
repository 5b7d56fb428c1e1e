//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。各 trait は外部システム
//! （永続 KV、ホストのタスクキュー、台帳ノード、インデクサ、メタデータ基盤、
//! ファイル保管庫）へのインターフェースで、実装は `impls` にあります。
//!
//! # 設計原則
//! - KV ストアが再起動をまたぐ唯一の正本
//! - オラクルの通信エラーは「判定不能」として扱い、伝播させない
//! - 終端状態への書き込み（削除・公開）は何度適用しても安全であること

pub mod artifact_store;
pub mod broadcaster;
pub mod clock;
pub mod file_archive;
pub mod id_generator;
pub mod kv_store;
pub mod metadata_sink;
pub mod oracle;
pub mod pending_store;
pub mod resource_info;
pub mod task_queue;

pub use self::artifact_store::ArtifactStore;
pub use self::broadcaster::Broadcaster;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::file_archive::FileArchive;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::kv_store::KeyValueStore;
pub use self::metadata_sink::MetadataSink;
pub use self::oracle::StatusOracle;
pub use self::pending_store::PendingStore;
pub use self::resource_info::ResourceInfo;
pub use self::task_queue::{InvocationSource, TaskQueue};
