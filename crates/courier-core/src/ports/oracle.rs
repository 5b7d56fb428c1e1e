//! StatusOracle port - 決着状況の問い合わせ先
//!
//! 複数のオラクルを優先順に並べ、`Inconclusive` なら次へ回します
//! （chain of responsibility）。通信エラーも呼び出し側で Inconclusive 扱いです。

use async_trait::async_trait;

use crate::domain::{Chain, CourierError, Resolution};

#[async_trait]
pub trait StatusOracle: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn query(&self, hash: &str, chain: Chain) -> Result<Resolution, CourierError>;
}
