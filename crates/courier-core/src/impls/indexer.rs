//! IndexerOracle - サードパーティのインデクサに決着状況を問い合わせる二次オラクル
//!
//! `GET {base}/mina-{network}/v1/zkapps/txs/{hash}`（`x-api-key` ヘッダ付き）。
//! 非 200・壊れたボディはエラーとして返し、呼び出し側が「判定不能」として扱います。

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{Chain, CourierError, Resolution, TxStatus};
use crate::ports::StatusOracle;

pub const DEFAULT_INDEXER_URL: &str = "https://api.blockberry.one";

#[derive(Clone, Debug)]
pub struct IndexerOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl IndexerOracle {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self, network: &str, hash: &str) -> String {
        format!("{}/mina-{network}/v1/zkapps/txs/{hash}", self.base_url)
    }
}

/// Read the `txStatus` field. Any known status, `pending` included, is adopted.
fn interpret_body(body: &Value) -> Resolution {
    let Some(raw) = body.get("txStatus").and_then(Value::as_str) else {
        return Resolution::Inconclusive;
    };
    match raw.parse::<TxStatus>() {
        Ok(status) => Resolution::Resolved(status),
        Err(unknown) => {
            tracing::debug!(%unknown, "indexer returned unrecognised status");
            Resolution::Inconclusive
        }
    }
}

#[async_trait]
impl StatusOracle for IndexerOracle {
    fn name(&self) -> &str {
        "indexer"
    }

    async fn query(&self, hash: &str, chain: Chain) -> Result<Resolution, CourierError> {
        let Some(network) = chain.indexer_network() else {
            return Ok(Resolution::Inconclusive);
        };

        let response = self
            .client
            .get(self.url(network, hash))
            .header("accept", "application/json")
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CourierError::oracle(
                "indexer",
                format!("{chain} {hash}: status {status}"),
            ));
        }

        let bytes = response.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| CourierError::oracle("indexer", format!("malformed body: {e}")))?;
        Ok(interpret_body(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"txStatus": "applied"}), Resolution::Resolved(TxStatus::Applied))]
    #[case(json!({"txStatus": "failed", "failures": []}), Resolution::Resolved(TxStatus::Failed))]
    #[case(json!({"txStatus": "pending"}), Resolution::Resolved(TxStatus::Pending))]
    #[case(json!({"txStatus": "included"}), Resolution::Inconclusive)]
    #[case(json!({"txStatus": 3}), Resolution::Inconclusive)]
    #[case(json!({}), Resolution::Inconclusive)]
    #[case(json!([1, 2]), Resolution::Inconclusive)]
    fn body_interpretation(#[case] body: Value, #[case] expected: Resolution) {
        assert_eq!(interpret_body(&body), expected);
    }

    #[test]
    fn url_uses_indexer_network_name() {
        let oracle = IndexerOracle::new("https://indexer.example/", "key");
        assert_eq!(
            oracle.url("devnet", "5Jabc"),
            "https://indexer.example/mina-devnet/v1/zkapps/txs/5Jabc"
        );
    }

    #[tokio::test]
    async fn chains_without_indexer_are_inconclusive() {
        // Unroutable base URL: the request must never be made.
        let oracle = IndexerOracle::new("http://127.0.0.1:9", "key");
        let resolution = oracle.query("5Jabc", Chain::ZekoTestnet).await.unwrap();
        assert_eq!(resolution, Resolution::Inconclusive);
    }
}
