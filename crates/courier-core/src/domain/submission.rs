//! Submission requests and results.

use serde::{Deserialize, Serialize};

use super::errors::CourierError;
use super::status::BroadcastStatus;
use super::transaction::Operation;

/// A proved and signed transaction, opaque to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedTransaction {
    payload: String,
}

impl SignedTransaction {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.payload.as_bytes()
    }
}

fn default_send() -> bool {
    true
}

/// Everything the submission channel needs to broadcast and later monitor a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub transaction: SignedTransaction,

    /// Human-readable name (the memo); also used in archive file names.
    pub name: String,
    pub operation: Operation,
    pub collection_address: String,
    #[serde(default)]
    pub nft_address: Option<String>,
    pub sender: String,
    #[serde(default)]
    pub price: Option<String>,
    pub job_id: String,

    /// Free-form fields published with the transaction metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Content hash of data pinned elsewhere (data availability reference).
    #[serde(default)]
    pub content_hash: Option<String>,

    /// `false` builds the result without broadcasting.
    #[serde(default = "default_send")]
    pub send: bool,
}

impl SubmissionRequest {
    /// Reject requests missing fields the channel cannot work without.
    pub fn validate(&self) -> Result<(), CourierError> {
        let required = [
            ("transaction", self.transaction.payload()),
            ("name", self.name.as_str()),
            ("collectionAddress", self.collection_address.as_str()),
            ("sender", self.sender.as_str()),
            ("jobId", self.job_id.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CourierError::MissingField(field));
            }
        }
        Ok(())
    }
}

/// What the network said about one broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    pub hash: Option<String>,
    pub status: BroadcastStatus,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl BroadcastReceipt {
    pub fn accepted(hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
            status: BroadcastStatus::Pending,
            errors: Vec::new(),
        }
    }

    pub fn rejected(hash: Option<String>, errors: Vec<String>) -> Self {
        Self {
            hash,
            status: BroadcastStatus::Rejected,
            errors,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status.is_accepted() && self.hash.is_some()
    }
}

/// Structured result handed back to the job host. Never a raw error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BroadcastStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmissionResult {
    /// Result of a dry run: the transaction is returned unsent.
    pub fn unsent(tx: &SignedTransaction) -> Self {
        Self {
            success: true,
            tx: Some(tx.payload().to_string()),
            hash: None,
            status: None,
            error: None,
        }
    }

    pub fn to_json(&self) -> Result<String, CourierError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
