//! Broadcaster port - 署名済みトランザクションの送信

use async_trait::async_trait;

use crate::domain::{BroadcastReceipt, CourierError, SignedTransaction};

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Send once. A rejection by the network is a receipt, not an error.
    async fn broadcast(&self, tx: &SignedTransaction) -> Result<BroadcastReceipt, CourierError>;

    /// Block until the transaction is included. Only used on local chains.
    async fn wait_for_inclusion(&self, hash: &str) -> Result<BroadcastReceipt, CourierError> {
        Ok(BroadcastReceipt::accepted(hash))
    }
}
