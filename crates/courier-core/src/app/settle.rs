//! Settler - 終端ステータスに達したトランザクションの後始末
//!
//! 1. 関連リソースの現在状態を取得（ベストエフォート）
//! 2. メタデータを公開（hash キーで上書きされるので再実行しても安全）
//! 3. pending セットから削除（冪等）
//! 4. replaced のときだけ調査用スナップショットを保存
//!
//! 公開または削除が失敗したらエラーを返し、レコードは pending のまま残ります
//! （次回の呼び出しで再処理される）。

use std::sync::Arc;

use serde_json::json;

use crate::domain::{CourierError, MetadataRecord, StoredTransaction, TxStatus};
use crate::ports::{Clock, FileArchive, MetadataSink, PendingStore, ResourceInfo};

pub struct Settler {
    pending: Arc<dyn PendingStore>,
    sink: Arc<dyn MetadataSink>,
    archive: Arc<dyn FileArchive>,
    resource_info: Option<Arc<dyn ResourceInfo>>,
    clock: Arc<dyn Clock>,
}

impl Settler {
    pub fn new(
        pending: Arc<dyn PendingStore>,
        sink: Arc<dyn MetadataSink>,
        archive: Arc<dyn FileArchive>,
        resource_info: Option<Arc<dyn ResourceInfo>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pending,
            sink,
            archive,
            resource_info,
            clock,
        }
    }

    pub async fn settle(&self, record: &StoredTransaction, status: TxStatus) -> Result<(), CourierError> {
        debug_assert!(status.is_terminal());
        let tx = &record.transaction;

        let info = self.fetch_info(record).await;
        let metadata = MetadataRecord::new(
            Some(tx.hash.clone()),
            json!({
                "status": status,
                "tx": tx,
                "info": info,
            }),
        )
        .with_settlement(tx.chain.as_str(), tx.hash.as_str());
        self.sink.publish(metadata).await?;

        self.pending.remove(tx.chain, record.id).await?;

        if status == TxStatus::Replaced {
            self.save_replaced_snapshot(record, status).await;
        }

        tracing::info!(hash = %tx.hash, chain = %tx.chain, %status, "transaction settled");
        Ok(())
    }

    async fn fetch_info(&self, record: &StoredTransaction) -> Option<serde_json::Value> {
        let resource_info = self.resource_info.as_ref()?;
        match resource_info.fetch(&record.transaction).await {
            Ok(info) => info,
            Err(error) => {
                tracing::warn!(hash = %record.transaction.hash, %error, "resource info unavailable");
                None
            }
        }
    }

    async fn save_replaced_snapshot(&self, record: &StoredTransaction, status: TxStatus) {
        let tx = &record.transaction;
        let now = self.clock.now();
        let snapshot = json!({
            "time": now.timestamp_millis(),
            "timeISO": now.to_rfc3339(),
            "hash": tx.hash,
            "status": status,
            "tx": tx,
            "transaction": record,
        });
        let filename = format!("{}-replaced-{}.json", tx.chain, tx.hash);

        let result = match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => self.archive.save(&filename, bytes).await,
            Err(e) => Err(e.into()),
        };
        if let Err(error) = result {
            tracing::error!(%filename, %error, "failed to save replaced snapshot");
        }
    }
}
