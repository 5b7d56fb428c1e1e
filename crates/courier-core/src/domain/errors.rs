//! Errors - エラー型と分類
//!
//! 想定内の外部障害（ネットワーク揺らぎ）はオーケストレータ内で吸収し、
//! 設定ミス・プログラミングエラーだけをホストへ伝播させます。
//! その判定に [`ErrorKind`] を使います。

use thiserror::Error;

/// ErrorKind は実行エラーの運用分類
///
/// - Transient: 一時的なエラー（次回の呼び出しで解消しうる）
/// - Permanent: 恒久的なエラー（設定・入力の誤り。ホストに通知する）
/// - Infrastructure: 永続化層・キューの障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum CourierError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("key-value store error: {0}")]
    Store(String),

    #[error("task queue error: {0}")]
    Queue(String),

    #[error("oracle {oracle} failed: {message}")]
    Oracle { oracle: String, message: String },

    #[error("broadcast error: {0}")]
    Broadcast(String),

    #[error("metadata sink error: {0}")]
    Sink(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl CourierError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CourierError::Config(_) | CourierError::MissingField(_) | CourierError::Json(_) => {
                ErrorKind::Permanent
            }
            CourierError::Store(_) | CourierError::Queue(_) | CourierError::Io(_) => {
                ErrorKind::Infrastructure
            }
            CourierError::Oracle { .. }
            | CourierError::Broadcast(_)
            | CourierError::Sink(_)
            | CourierError::Archive(_)
            | CourierError::Http(_) => ErrorKind::Transient,
        }
    }

    /// Should this error escape to the host scheduler?
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Permanent
    }

    pub fn oracle(oracle: impl Into<String>, message: impl Into<String>) -> Self {
        CourierError::Oracle {
            oracle: oracle.into(),
            message: message.into(),
        }
    }
}
