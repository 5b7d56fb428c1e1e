//! SubmissionChannel - 署名済みトランザクションの送信と監視への引き渡し
//!
//! # 流れ
//! 1. 分散ストレージへの保存と、送信リトライループを並行に実行
//!    - ネットワークが受理（`pending`）したら終了
//!    - 拒否なら `backoff` 待って再送、`timeout` を過ぎたら最後の結果を返す
//! 2. ローカルモードではブロック取り込みを待つ
//! 3. メタデータ公開、送信ログの保存
//! 4. 受理かつ非同期決着のチェーンなら pending セットに追加し、監視タスクを登録
//!
//! 呼び出し側には必ず構造化された SubmissionResult を返します
//! （入力の不備だけはエラーとして返す）。

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::Instant;

use crate::app::rearm::MonitorArming;
use crate::domain::{
    BroadcastReceipt, Chain, CourierError, MetadataRecord, PendingTransaction, SignedTransaction,
    StorageRef, SubmissionRequest, SubmissionResult,
};
use crate::ports::{ArtifactStore, Broadcaster, Clock, FileArchive, MetadataSink, PendingStore};

pub struct SubmissionChannel {
    pub(crate) broadcaster: Arc<dyn Broadcaster>,
    pub(crate) artifacts: Option<Arc<dyn ArtifactStore>>,
    pub(crate) sink: Arc<dyn MetadataSink>,
    pub(crate) archive: Arc<dyn FileArchive>,
    pub(crate) pending: Arc<dyn PendingStore>,
    pub(crate) arming: Arc<MonitorArming>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) chain: Chain,
    pub(crate) local_mode: bool,
    pub(crate) timeout: Duration,
    pub(crate) backoff: Duration,
}

impl SubmissionChannel {
    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmissionResult, CourierError> {
        request.validate()?;
        if !request.send {
            tracing::info!(name = %request.name, "dry run, transaction not sent");
            return Ok(SubmissionResult::unsent(&request.transaction));
        }

        let (pinned, receipt) = tokio::join!(
            self.pin(&request),
            self.broadcast_with_retry(&request.transaction, &request.name)
        );

        if self.local_mode
            && receipt.status.is_accepted()
            && self.chain.waits_for_inclusion()
            && let Some(hash) = receipt.hash.as_deref()
        {
            match self.broadcaster.wait_for_inclusion(hash).await {
                Ok(included) => tracing::info!(name = %request.name, %hash, status = %included.status, "transaction included"),
                Err(error) => tracing::warn!(name = %request.name, %hash, %error, "inclusion wait failed"),
            }
        }

        self.publish_metadata(&request, &receipt, pinned).await;
        self.save_log(&request, &receipt).await;

        let success = receipt.is_accepted();
        let mut result = self.result(&request.transaction, &receipt, success);

        if success
            && !self.chain.settles_synchronously()
            && let Err(error) = self.hand_off(&request, &receipt).await
        {
            tracing::error!(name = %request.name, hash = ?receipt.hash, %error, "failed to hand transaction to monitor");
            result.success = false;
            result.error = Some(format!("monitoring hand-off failed: {error}"));
        }
        Ok(result)
    }

    /// Broadcast until accepted or `timeout` has elapsed. Never fails: transport
    /// errors count as rejections.
    async fn broadcast_with_retry(&self, tx: &SignedTransaction, name: &str) -> BroadcastReceipt {
        let start = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let receipt = match self.broadcaster.broadcast(tx).await {
                Ok(receipt) => receipt,
                Err(error) => BroadcastReceipt::rejected(None, vec![error.to_string()]),
            };

            if receipt.status.is_accepted() {
                tracing::info!(%name, hash = ?receipt.hash, attempt, "transaction sent");
                return receipt;
            }
            if start.elapsed() >= self.timeout {
                tracing::warn!(%name, attempt, errors = ?receipt.errors, "transaction not sent, giving up");
                return receipt;
            }

            tracing::info!(%name, attempt, errors = ?receipt.errors, "broadcast rejected, retrying");
            tokio::time::sleep(self.backoff).await;
            if start.elapsed() >= self.timeout {
                tracing::warn!(%name, attempt, errors = ?receipt.errors, "transaction not sent, giving up");
                return receipt;
            }
        }
    }

    /// Best-effort copy of the signed payload to the artifact store.
    async fn pin(&self, request: &SubmissionRequest) -> Option<(String, String)> {
        let store = self.artifacts.as_ref()?;
        let filename = format!("{}.json", request.name);
        match store.put(&filename, request.transaction.as_bytes().to_vec()).await {
            Ok(hash) => hash.map(|hash| (store.provider().to_string(), hash)),
            Err(error) => {
                tracing::error!(%filename, %error, "failed to pin transaction payload");
                None
            }
        }
    }

    async fn publish_metadata(
        &self,
        request: &SubmissionRequest,
        receipt: &BroadcastReceipt,
        pinned: Option<(String, String)>,
    ) {
        let mut custom = match &request.metadata {
            Value::Object(fields) => fields.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                let mut fields = serde_json::Map::new();
                fields.insert("metadata".into(), other.clone());
                fields
            }
        };
        custom.insert("txStatus".into(), json!(receipt.status));
        custom.insert("txErrors".into(), json!(receipt.errors));
        custom.insert("txHash".into(), json!(receipt.hash));

        let mut record = MetadataRecord::new(receipt.hash.clone(), Value::Object(custom));
        if let Some(hash) = &receipt.hash {
            record = record.with_settlement(self.chain.as_str(), hash.as_str());
        }
        if let Some((provider, hash)) = pinned {
            record = record.with_proof(StorageRef {
                chain: provider,
                network: self.chain.to_string(),
                hash,
            });
        }
        if let Some(hash) = &request.content_hash {
            let provider = self
                .artifacts
                .as_ref()
                .map_or("ipfs".to_string(), |store| store.provider().to_string());
            record = record.with_data_availability(StorageRef {
                chain: provider,
                network: self.chain.to_string(),
                hash: hash.clone(),
            });
        }

        if let Err(error) = self.sink.publish(record).await {
            tracing::error!(name = %request.name, %error, "failed to publish transaction metadata");
        }
    }

    async fn save_log(&self, request: &SubmissionRequest, receipt: &BroadcastReceipt) {
        let now = self.clock.now();
        let suffix = receipt
            .hash
            .clone()
            .unwrap_or_else(|| now.timestamp_millis().to_string());
        let filename = format!("{}-{}-{}-{suffix}.json", self.chain, request.operation, request.name);
        let body = json!({
            "time": now.timestamp_millis(),
            "timeISO": now.to_rfc3339(),
            "hash": receipt.hash,
            "status": receipt.status,
            "errors": receipt.errors,
            "tx": request.transaction,
        });

        let result = match serde_json::to_vec_pretty(&body) {
            Ok(bytes) => self.archive.save(&filename, bytes).await,
            Err(e) => Err(e.into()),
        };
        if let Err(error) = result {
            tracing::error!(%filename, %error, "failed to save submission log");
        }
    }

    /// Insert first, then arm: an idle monitor that retires in between is
    /// replaced by the freshly armed one.
    async fn hand_off(&self, request: &SubmissionRequest, receipt: &BroadcastReceipt) -> Result<(), CourierError> {
        let hash = receipt.hash.clone().ok_or(CourierError::MissingField("hash"))?;
        let transaction = PendingTransaction {
            hash,
            chain: self.chain,
            collection_address: request.collection_address.clone(),
            nft_address: request.nft_address.clone(),
            job_id: request.job_id.clone(),
            sender: request.sender.clone(),
            operation: request.operation,
            price: request.price.clone(),
            name: request.name.clone(),
        };
        let id = self.pending.insert(transaction, self.clock.now()).await?;
        tracing::debug!(record_id = %id, "transaction added to pending set");
        self.arming.arm().await?;
        Ok(())
    }

    fn result(&self, tx: &SignedTransaction, receipt: &BroadcastReceipt, success: bool) -> SubmissionResult {
        let hash = if success || !self.chain.drops_rejected_hash() {
            receipt.hash.clone()
        } else {
            None
        };
        SubmissionResult {
            success,
            tx: if hash.is_some() {
                None
            } else {
                Some(tx.payload().to_string())
            },
            hash,
            status: Some(receipt.status),
            error: if receipt.errors.is_empty() {
                None
            } else {
                Some(receipt.errors.join("; "))
            },
        }
    }
}
