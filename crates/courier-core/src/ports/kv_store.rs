//! KeyValueStore port - プロセス再起動をまたぐ永続 KV
//!
//! ロックのタイムスタンプ、セッショントークン、監視タスク ID、
//! セッション開始時刻を保存します。値は文字列のみ。

use async_trait::async_trait;

use crate::domain::CourierError;

/// KeyValueStore は durable な文字列 KV
///
/// # 設計原則
/// - `set(key, None)` はキーの削除（存在しなくてもエラーにしない）
/// - 比較交換は提供しない。排他はベストエフォート（SingleFlightGuard 参照）
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError>;

    async fn set(&self, key: &str, value: Option<String>) -> Result<(), CourierError>;
}
