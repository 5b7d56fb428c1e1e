//! FileArchive port - 調査用スナップショットの保存先
//!
//! 送信ログと、replaced になったトランザクションのスナップショットを保存します。

use async_trait::async_trait;

use crate::domain::CourierError;

#[async_trait]
pub trait FileArchive: Send + Sync {
    async fn save(&self, filename: &str, bytes: Vec<u8>) -> Result<(), CourierError>;
}
