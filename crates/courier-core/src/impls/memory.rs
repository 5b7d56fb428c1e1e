//! In-memory adapters (開発用・テスト用)
//!
//! プロセス内で完結する KV ストア、メタデータシンク、ファイル保管庫です。
//! 内容を覗くためのメソッドを持つので、テストで副作用を検証できます。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{CourierError, MetadataRecord};
use crate::ports::{ArtifactStore, FileArchive, KeyValueStore, MetadataSink};

/// InMemoryKvStore は HashMap ベースの KV
///
/// clone は同じ中身を共有します（「再起動」を模擬するときは同じ store を使い回す）。
#[derive(Debug, Clone, Default)]
pub struct InMemoryKvStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Option<String>) -> Result<(), CourierError> {
        let mut entries = self.entries.lock().await;
        match value {
            Some(value) => {
                entries.insert(key.to_string(), value);
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }
}

/// Keeps every published record, in publication order.
#[derive(Debug, Clone, Default)]
pub struct RecordingMetadataSink {
    records: Arc<Mutex<Vec<MetadataRecord>>>,
    failures: Arc<Mutex<usize>>,
}

impl RecordingMetadataSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<MetadataRecord> {
        self.records.lock().await.clone()
    }

    /// Make the next `n` publishes fail without recording anything.
    pub async fn fail_next(&self, n: usize) {
        *self.failures.lock().await = n;
    }

    /// Latest record per `tx_id`, which is what a keyed sink would hold.
    pub async fn latest(&self, tx_id: &str) -> Option<MetadataRecord> {
        self.records
            .lock()
            .await
            .iter()
            .rev()
            .find(|r| r.tx_id.as_deref() == Some(tx_id))
            .cloned()
    }
}

#[async_trait]
impl MetadataSink for RecordingMetadataSink {
    async fn publish(&self, record: MetadataRecord) -> Result<(), CourierError> {
        {
            let mut failures = self.failures.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(CourierError::Sink("recording sink told to fail".into()));
            }
        }
        self.records.lock().await.push(record);
        Ok(())
    }
}

/// File archive backed by a map of file name to bytes.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileArchive {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryFileArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.files.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn json(&self, filename: &str) -> Option<serde_json::Value> {
        let files = self.files.lock().await;
        files
            .get(filename)
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }
}

#[async_trait]
impl FileArchive for MemoryFileArchive {
    async fn save(&self, filename: &str, bytes: Vec<u8>) -> Result<(), CourierError> {
        self.files.lock().await.insert(filename.to_string(), bytes);
        Ok(())
    }
}

/// Artifact store that "pins" into memory and returns a fixed-format content hash.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactStore {
    pinned: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pinned(&self) -> Vec<String> {
        self.pinned.lock().await.iter().map(|(name, _)| name.clone()).collect()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, filename: &str, bytes: Vec<u8>) -> Result<Option<String>, CourierError> {
        let mut pinned = self.pinned.lock().await;
        pinned.push((filename.to_string(), bytes));
        Ok(Some(format!("mem-{}", pinned.len())))
    }

    fn provider(&self) -> &str {
        "memory"
    }
}
