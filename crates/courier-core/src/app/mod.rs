//! App - アプリケーション層
//!
//! ports を組み合わせて監視・送信のロジックを実装します。
//!
//! # 主要コンポーネント
//! - **OrchestratorBuilder**: ports のワイヤリング（fail-fast）
//! - **Orchestrator**: ホストからの入口（タスク配送、送信、監視の登録）
//! - **SingleFlightGuard**: タスク ID 単位のベストエフォート排他
//! - **MonitorLoop**: pending セットの消化とセッション管理
//! - **StatusResolver / Settler**: ステータス判定と決着処理
//! - **MonitorArming**: 監視タスクの張り直し
//! - **SubmissionChannel**: 送信リトライと監視への引き渡し
//! - **WorkerGroup**: プロセス内キューを回すワーカー

pub mod builder;
pub mod guard;
pub mod monitor;
pub mod orchestrator;
pub mod rearm;
pub mod resolver;
pub mod settle;
pub mod submission;
pub mod worker;

#[cfg(test)]
pub(crate) mod testkit;

pub use self::builder::{BuildError, OrchestratorBuilder};
pub use self::guard::SingleFlightGuard;
pub use self::monitor::MonitorLoop;
pub use self::orchestrator::{Orchestrator, TASK_ERROR_SUMMARY};
pub use self::rearm::MonitorArming;
pub use self::resolver::StatusResolver;
pub use self::settle::Settler;
pub use self::submission::SubmissionChannel;
pub use self::worker::WorkerGroup;
