//! GraphqlNode - 台帳ノードの GraphQL API クライアント
//!
//! 一次オラクル（`transactionStatus`）とブロードキャスタ（`sendZkapp`）を兼ねます。
//! レスポンスの解釈は純粋関数に切り出してあり、HTTP なしでテストできます。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::domain::{BroadcastReceipt, Chain, CourierError, Resolution, SignedTransaction, TxStatus};
use crate::ports::{Broadcaster, StatusOracle};

const STATUS_QUERY: &str = r#"
    query($hash: String!) {
        transactionStatus(hash: $hash)
    }
"#;

const SEND_MUTATION: &str = r#"
    mutation($input: SendZkappInput!) {
        sendZkapp(input: $input) {
            zkapp {
                hash
            }
        }
    }
"#;

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Clone, Debug)]
pub struct GraphqlNode {
    client: reqwest::Client,
    endpoint: String,
    inclusion_poll: Duration,
    inclusion_attempts: u32,
}

impl GraphqlNode {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            inclusion_poll: Duration::from_secs(10),
            inclusion_attempts: 60,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// How often and how many times `wait_for_inclusion` polls the node.
    pub fn with_inclusion_polling(mut self, every: Duration, attempts: u32) -> Self {
        self.inclusion_poll = every;
        self.inclusion_attempts = attempts;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn execute(&self, query: &str, variables: Value) -> Result<GraphqlResponse, CourierError> {
        let body = json!({ "query": query, "variables": variables });
        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CourierError::oracle(
                "graphql",
                format!("request failed with status: {status}"),
            ));
        }
        Ok(response.json::<GraphqlResponse>().await?)
    }

    async fn transaction_status(&self, hash: &str) -> Result<Option<String>, CourierError> {
        let response = self.execute(STATUS_QUERY, status_variables(hash)).await?;
        if let Some(error) = response.errors.first() {
            return Err(CourierError::oracle("graphql", error.message.clone()));
        }
        Ok(response
            .data
            .as_ref()
            .and_then(|d| d.get("transactionStatus"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

/// Status lookups are keyed by the transaction hash.
fn status_variables(hash: &str) -> Value {
    json!({ "hash": hash })
}

/// `INCLUDED` is the only definitive answer the node gives.
fn interpret_status(status: Option<&str>) -> Resolution {
    match status {
        Some(s) if s.eq_ignore_ascii_case("included") => Resolution::Resolved(TxStatus::Applied),
        _ => Resolution::Inconclusive,
    }
}

/// The signed payload is normally the JSON of the zkApp command; pass it through as JSON when it parses.
fn zkapp_command(tx: &SignedTransaction) -> Value {
    serde_json::from_str(tx.payload()).unwrap_or_else(|_| Value::String(tx.payload().to_string()))
}

fn interpret_send(response: GraphqlResponse) -> BroadcastReceipt {
    let hash = response
        .data
        .as_ref()
        .and_then(|d| d.pointer("/sendZkapp/zkapp/hash"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if !response.errors.is_empty() {
        let errors = response.errors.into_iter().map(|e| e.message).collect();
        return BroadcastReceipt::rejected(hash, errors);
    }
    match hash {
        Some(hash) => BroadcastReceipt::accepted(hash),
        None => BroadcastReceipt::rejected(None, vec!["node returned no transaction hash".into()]),
    }
}

#[async_trait]
impl StatusOracle for GraphqlNode {
    fn name(&self) -> &str {
        "graphql"
    }

    async fn query(&self, hash: &str, _chain: Chain) -> Result<Resolution, CourierError> {
        let status = self.transaction_status(hash).await?;
        Ok(interpret_status(status.as_deref()))
    }
}

#[async_trait]
impl Broadcaster for GraphqlNode {
    async fn broadcast(&self, tx: &SignedTransaction) -> Result<BroadcastReceipt, CourierError> {
        let variables = json!({ "input": { "zkappCommand": zkapp_command(tx) } });
        let response = self
            .execute(SEND_MUTATION, variables)
            .await
            .map_err(|e| CourierError::Broadcast(e.to_string()))?;
        Ok(interpret_send(response))
    }

    async fn wait_for_inclusion(&self, hash: &str) -> Result<BroadcastReceipt, CourierError> {
        for attempt in 1..=self.inclusion_attempts {
            match self.transaction_status(hash).await {
                Ok(status) if interpret_status(status.as_deref()).is_resolved() => {
                    return Ok(BroadcastReceipt::accepted(hash));
                }
                Ok(_) => {}
                Err(error) => tracing::warn!(%hash, attempt, %error, "inclusion poll failed"),
            }
            tokio::time::sleep(self.inclusion_poll).await;
        }
        Ok(BroadcastReceipt::rejected(
            Some(hash.to_string()),
            vec![format!("not included after {} polls", self.inclusion_attempts)],
        ))
    }
}
