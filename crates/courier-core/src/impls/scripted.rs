//! Scripted adapters - 応答を事前に決めておけるオラクル・ブロードキャスタ
//!
//! テストと `courier` CLI のドライランで使います。呼び出し回数を数えるので、
//! 「終端ステータスは再問い合わせしない」といった性質を検証できます。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{BroadcastReceipt, Chain, CourierError, PendingTransaction, Resolution, SignedTransaction};
use crate::ports::{Broadcaster, ResourceInfo, StatusOracle};

#[derive(Debug, Clone)]
enum Answer {
    Resolution(Resolution),
    Failure(String),
}

/// Oracle answering from a per-hash table; unknown hashes are inconclusive.
#[derive(Debug, Clone)]
pub struct ScriptedOracle {
    name: String,
    answers: Arc<Mutex<HashMap<String, Answer>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedOracle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            answers: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn answer(&self, hash: &str, resolution: Resolution) {
        self.answers
            .lock()
            .await
            .insert(hash.to_string(), Answer::Resolution(resolution));
    }

    /// Make queries for `hash` fail with a transport-style error.
    pub async fn fail(&self, hash: &str, message: &str) {
        self.answers
            .lock()
            .await
            .insert(hash.to_string(), Answer::Failure(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusOracle for ScriptedOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, hash: &str, _chain: Chain) -> Result<Resolution, CourierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.lock().await.get(hash) {
            Some(Answer::Resolution(resolution)) => Ok(*resolution),
            Some(Answer::Failure(message)) => Err(CourierError::oracle(&self.name, message.clone())),
            None => Ok(Resolution::Inconclusive),
        }
    }
}

/// Broadcaster replaying a script of outcomes.
///
/// Once the script runs out the last outcome repeats; an empty script accepts
/// everything with a hash derived from the call number.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBroadcaster {
    script: Arc<Mutex<VecDeque<Result<BroadcastReceipt, String>>>>,
    last: Arc<Mutex<Option<Result<BroadcastReceipt, String>>>>,
    calls: Arc<AtomicUsize>,
    inclusion_waits: Arc<AtomicUsize>,
}

impl ScriptedBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn rejecting(error: impl Into<String>) -> Self {
        let receipt = BroadcastReceipt::rejected(None, vec![error.into()]);
        Self {
            script: Arc::new(Mutex::new(VecDeque::from([Ok(receipt)]))),
            ..Self::default()
        }
    }

    pub async fn push(&self, receipt: BroadcastReceipt) {
        self.script.lock().await.push_back(Ok(receipt));
    }

    pub async fn push_error(&self, message: impl Into<String>) {
        self.script.lock().await.push_back(Err(message.into()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inclusion_waits(&self) -> usize {
        self.inclusion_waits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broadcaster for ScriptedBroadcaster {
    async fn broadcast(&self, _tx: &SignedTransaction) -> Result<BroadcastReceipt, CourierError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let next = self.script.lock().await.pop_front();
        let outcome = match next {
            Some(outcome) => {
                *self.last.lock().await = Some(outcome.clone());
                outcome
            }
            None => self
                .last
                .lock()
                .await
                .clone()
                .unwrap_or_else(|| Ok(BroadcastReceipt::accepted(format!("5Jscripted{call}")))),
        };
        outcome.map_err(CourierError::Broadcast)
    }

    async fn wait_for_inclusion(&self, hash: &str) -> Result<BroadcastReceipt, CourierError> {
        self.inclusion_waits.fetch_add(1, Ordering::SeqCst);
        Ok(BroadcastReceipt::accepted(hash))
    }
}

/// Resource info returning the same document for every transaction.
#[derive(Debug, Clone)]
pub struct StaticResourceInfo {
    info: Option<serde_json::Value>,
}

impl StaticResourceInfo {
    pub fn new(info: Option<serde_json::Value>) -> Self {
        Self { info }
    }
}

#[async_trait]
impl ResourceInfo for StaticResourceInfo {
    async fn fetch(&self, _tx: &PendingTransaction) -> Result<Option<serde_json::Value>, CourierError> {
        Ok(self.info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BroadcastStatus, TxStatus};

    #[tokio::test]
    async fn oracle_answers_from_table() {
        let oracle = ScriptedOracle::new("node");
        oracle.answer("A", Resolution::Resolved(TxStatus::Applied)).await;
        oracle.fail("B", "connection reset").await;

        assert_eq!(
            oracle.query("A", Chain::MinaDevnet).await.unwrap(),
            Resolution::Resolved(TxStatus::Applied)
        );
        assert!(oracle.query("B", Chain::MinaDevnet).await.is_err());
        assert_eq!(
            oracle.query("C", Chain::MinaDevnet).await.unwrap(),
            Resolution::Inconclusive
        );
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn broadcaster_repeats_last_outcome() {
        let broadcaster = ScriptedBroadcaster::rejecting("nonce too low");
        let tx = SignedTransaction::new("{}");

        for _ in 0..3 {
            let receipt = broadcaster.broadcast(&tx).await.unwrap();
            assert_eq!(receipt.status, BroadcastStatus::Rejected);
        }
        assert_eq!(broadcaster.calls(), 3);
    }

    #[tokio::test]
    async fn broadcaster_script_then_accept() {
        let broadcaster = ScriptedBroadcaster::new();
        broadcaster.push_error("timeout").await;
        broadcaster.push(BroadcastReceipt::accepted("5Jx")).await;
        let tx = SignedTransaction::new("{}");

        assert!(broadcaster.broadcast(&tx).await.is_err());
        assert!(broadcaster.broadcast(&tx).await.unwrap().is_accepted());
        assert_eq!(
            broadcaster.broadcast(&tx).await.unwrap().hash.as_deref(),
            Some("5Jx")
        );
    }
}
