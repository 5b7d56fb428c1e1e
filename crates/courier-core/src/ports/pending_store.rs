//! PendingStore port - 決着待ちトランザクションの集合
//!
//! 提出時に追加され、監視ループが終端ステータスを確定したときに削除されます。
//! チェーンごとに論理的に分割されています。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Chain, CourierError, PendingTransaction, RecordId, StoredTransaction};

#[async_trait]
pub trait PendingStore: Send + Sync {
    async fn insert(
        &self,
        transaction: PendingTransaction,
        time_received: DateTime<Utc>,
    ) -> Result<RecordId, CourierError>;

    /// All outstanding records for `chain`, in no particular order.
    async fn list(&self, chain: Chain) -> Result<Vec<StoredTransaction>, CourierError>;

    /// Idempotent: removing an absent record succeeds.
    async fn remove(&self, chain: Chain, id: RecordId) -> Result<(), CourierError>;
}
