//! ArtifactStore port - 署名済みペイロードの分散ストレージ保存
//!
//! 失敗してもトランザクション送信は失敗させません（ログのみ）。

use async_trait::async_trait;

use crate::domain::CourierError;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` and return the content hash, if the store produced one.
    async fn put(&self, filename: &str, bytes: Vec<u8>) -> Result<Option<String>, CourierError>;

    /// Storage provider name published alongside the content hash.
    fn provider(&self) -> &str;
}
