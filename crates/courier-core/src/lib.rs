//! courier-core
//!
//! 署名済みトランザクションを台帳へ送信し、決着（applied / replaced / failed）
//! まで見届けるオーケストレータの中核です。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, chain, status, transaction, submission, task, outcome, errors）
//! - **ports**: 抽象化レイヤー（KeyValueStore, TaskQueue, PendingStore, StatusOracle, Broadcaster, など）
//! - **app**: アプリケーションロジック（builder, orchestrator, guard, monitor, submission, worker）
//! - **impls**: 実装（インメモリ / ファイル / HTTP アダプタ、テスト用スクリプト実装）
//! - **config**: オーケストレータ設定と KV キーの命名

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{BuildError, Orchestrator, OrchestratorBuilder, WorkerGroup};
pub use config::OrchestratorConfig;
pub use domain::{CourierError, SubmissionRequest, SubmissionResult};
