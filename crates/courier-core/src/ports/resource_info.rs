//! ResourceInfo port - 決着したトランザクションが触ったリソースの現在状態

use async_trait::async_trait;

use crate::domain::{CourierError, PendingTransaction};

#[async_trait]
pub trait ResourceInfo: Send + Sync {
    /// Current state of the collection / item touched by `tx`. Best-effort.
    async fn fetch(&self, tx: &PendingTransaction) -> Result<Option<serde_json::Value>, CourierError>;
}
