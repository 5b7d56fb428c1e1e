//! Metadata records published to the external sink.

use serde::{Deserialize, Serialize};

/// A transaction hash on a given chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRef {
    pub chain: String,
    pub hash: String,
}

/// Content stored on a pinning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRef {
    /// Storage provider (e.g. "pinata").
    pub chain: String,
    pub network: String,
    pub hash: String,
}

/// One record for the metadata sink.
///
/// The sink keys records by `tx_id`, so publishing the same record twice is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub tx_id: Option<String>,
    pub custom: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub settlement_txs: Vec<SettlementRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proofs: Vec<StorageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_availability_txs: Vec<StorageRef>,
}

impl MetadataRecord {
    pub fn new(tx_id: Option<String>, custom: serde_json::Value) -> Self {
        Self {
            tx_id,
            custom,
            settlement_txs: Vec::new(),
            proofs: Vec::new(),
            data_availability_txs: Vec::new(),
        }
    }

    pub fn with_settlement(mut self, chain: impl Into<String>, hash: impl Into<String>) -> Self {
        self.settlement_txs.push(SettlementRef {
            chain: chain.into(),
            hash: hash.into(),
        });
        self
    }

    pub fn with_proof(mut self, storage: StorageRef) -> Self {
        self.proofs.push(storage);
        self
    }

    pub fn with_data_availability(mut self, storage: StorageRef) -> Self {
        self.data_availability_txs.push(storage);
        self
    }
}
