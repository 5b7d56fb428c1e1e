//! StatusResolver - オラクルを優先順に問い合わせて 4 値のステータスを決める
//!
//! 最初に明示的なステータス（pending を含む）を返したオラクルの答えを採用します。
//! どのオラクルも判定不能なときだけ、受信からの経過時間で replaced にします。

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Chain, Resolution, StoredTransaction, TxStatus};
use crate::ports::{Clock, StatusOracle};

pub struct StatusResolver {
    oracles: Vec<Arc<dyn StatusOracle>>,
    clock: Arc<dyn Clock>,
    replace_after: Duration,
}

impl StatusResolver {
    pub fn new(oracles: Vec<Arc<dyn StatusOracle>>, clock: Arc<dyn Clock>, replace_after: Duration) -> Self {
        Self {
            oracles,
            clock,
            replace_after,
        }
    }

    /// Never fails: oracle errors count as "no answer" for this attempt.
    pub async fn resolve(&self, record: &StoredTransaction) -> TxStatus {
        let hash = record.transaction.hash.as_str();
        let chain = record.transaction.chain;

        if let Some(status) = self.ask_oracles(hash, chain).await {
            return status;
        }

        let age = self.clock.now() - record.time_received;
        // negative age (clock skew) converts to Err and counts as fresh
        if age.to_std().is_ok_and(|age| age > self.replace_after) {
            tracing::warn!(
                %hash,
                %chain,
                age_secs = age.num_seconds(),
                "no oracle verdict within replacement window, marking replaced"
            );
            TxStatus::Replaced
        } else {
            TxStatus::Pending
        }
    }

    async fn ask_oracles(&self, hash: &str, chain: Chain) -> Option<TxStatus> {
        for oracle in &self.oracles {
            match oracle.query(hash, chain).await {
                Ok(Resolution::Resolved(status)) => {
                    tracing::debug!(oracle = oracle.name(), %hash, %status, "oracle verdict");
                    return Some(status);
                }
                Ok(Resolution::Inconclusive) => {}
                Err(error) => {
                    tracing::warn!(oracle = oracle.name(), %hash, %chain, %error, "oracle query failed");
                }
            }
        }
        None
    }
}
