//! MetadataSink port - 決着結果・送信結果の公開先
//!
//! `tx_id` をキーに上書きされる前提なので、同じレコードを二度送っても問題ありません。

use async_trait::async_trait;

use crate::domain::{CourierError, MetadataRecord};

#[async_trait]
pub trait MetadataSink: Send + Sync {
    async fn publish(&self, record: MetadataRecord) -> Result<(), CourierError>;
}
