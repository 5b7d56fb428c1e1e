//! KvPendingStore - pending セットを KV ストアの中に保存する
//!
//! チェーンごとに 1 キー（JSON 配列）。KV が durable なら pending セットも
//! 再起動をまたいで残ります。
//!
//! # 注意
//! read-modify-write の排他はこのプロセス内だけです。複数プロセスで同じ KV を
//! 共有する場合は、PendingStore を KV 以外で実装してください。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{Chain, CourierError, PendingTransaction, RecordId, StoredTransaction};
use crate::ports::{IdGenerator, KeyValueStore, PendingStore};

pub struct KvPendingStore {
    store: Arc<dyn KeyValueStore>,
    ids: Arc<dyn IdGenerator>,
    prefix: String,
    write_lock: Mutex<()>,
}

impl KvPendingStore {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ids: Arc<dyn IdGenerator>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ids,
            prefix: prefix.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn key(&self, chain: Chain) -> String {
        format!("{}.pending.{}", self.prefix, chain)
    }

    async fn load(&self, chain: Chain) -> Result<Vec<StoredTransaction>, CourierError> {
        match self.store.get(&self.key(chain)).await? {
            Some(raw) if !raw.is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    async fn save(&self, chain: Chain, records: &[StoredTransaction]) -> Result<(), CourierError> {
        let value = if records.is_empty() {
            None
        } else {
            Some(serde_json::to_string(records)?)
        };
        self.store.set(&self.key(chain), value).await
    }
}

#[async_trait]
impl PendingStore for KvPendingStore {
    async fn insert(
        &self,
        transaction: PendingTransaction,
        time_received: DateTime<Utc>,
    ) -> Result<RecordId, CourierError> {
        let _guard = self.write_lock.lock().await;
        let chain = transaction.chain;
        let mut records = self.load(chain).await?;
        let id = self.ids.generate_record_id();
        records.push(StoredTransaction {
            id,
            transaction,
            time_received,
        });
        self.save(chain, &records).await?;
        Ok(id)
    }

    async fn list(&self, chain: Chain) -> Result<Vec<StoredTransaction>, CourierError> {
        self.load(chain).await
    }

    async fn remove(&self, chain: Chain, id: RecordId) -> Result<(), CourierError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load(chain).await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() != before {
            self.save(chain, &records).await?;
        }
        Ok(())
    }
}
