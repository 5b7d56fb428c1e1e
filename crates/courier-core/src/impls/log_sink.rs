//! LogMetadataSink - メタデータを構造化ログとして出力するシンク
//!
//! 外部のメタデータ基盤がない環境（ローカル運用）向けです。

use async_trait::async_trait;

use crate::domain::{CourierError, MetadataRecord};
use crate::ports::MetadataSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetadataSink;

#[async_trait]
impl MetadataSink for LogMetadataSink {
    async fn publish(&self, record: MetadataRecord) -> Result<(), CourierError> {
        let body = serde_json::to_string(&record)?;
        tracing::info!(
            target: "courier::metadata",
            tx_id = record.tx_id.as_deref().unwrap_or("-"),
            settlements = record.settlement_txs.len(),
            record = %body,
            "metadata published"
        );
        Ok(())
    }
}
