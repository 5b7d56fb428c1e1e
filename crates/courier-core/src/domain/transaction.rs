//! Pending transaction records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chain::Chain;
use super::ids::RecordId;

/// Kind of ledger operation carried by a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "nft:launch")]
    Launch,
    #[serde(rename = "nft:mint")]
    Mint,
    #[serde(rename = "nft:sell")]
    Sell,
    #[serde(rename = "nft:buy")]
    Buy,
    #[serde(rename = "nft:transfer")]
    Transfer,
    #[serde(rename = "nft:approve")]
    Approve,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Launch => "nft:launch",
            Operation::Mint => "nft:mint",
            Operation::Sell => "nft:sell",
            Operation::Buy => "nft:buy",
            Operation::Transfer => "nft:transfer",
            Operation::Approve => "nft:approve",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A broadcast transaction waiting for settlement.
///
/// Owned by the orchestrator between acceptance and terminal resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    pub hash: String,
    pub chain: Chain,
    pub collection_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_address: Option<String>,
    pub job_id: String,
    pub sender: String,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub name: String,
}

/// A pending transaction as held by the pending set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTransaction {
    pub id: RecordId,
    pub transaction: PendingTransaction,
    pub time_received: DateTime<Utc>,
}

impl StoredTransaction {
    /// Oldest first; ties broken by record id so the order is stable.
    pub fn sort_oldest_first(records: &mut [StoredTransaction]) {
        records.sort_by(|a, b| {
            a.time_received
                .cmp(&b.time_received)
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}

#[cfg(test)]
pub(crate) fn sample_transaction(hash: &str, chain: Chain) -> PendingTransaction {
    PendingTransaction {
        hash: hash.to_string(),
        chain,
        collection_address: "B62qcollection".to_string(),
        nft_address: Some("B62qnft".to_string()),
        job_id: "job-1".to_string(),
        sender: "B62qsender".to_string(),
        operation: Operation::Mint,
        price: None,
        name: format!("mint-{hash}"),
    }
}
