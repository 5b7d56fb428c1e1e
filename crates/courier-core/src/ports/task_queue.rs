//! TaskQueue port - 定期実行タスクの登録と削除
//!
//! ホスト側スケジューラは「投げっぱなし」のタスク登録しか持たないため、
//! 監視ループは自分自身をこのキューに登録し直して継続します。
//! `args` は配送時にそのまま Invocation として戻ってきます。

use async_trait::async_trait;

use crate::domain::{CourierError, Invocation, TaskId, TaskRequest};

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, request: TaskRequest) -> Result<TaskId, CourierError>;

    /// Delete a task. Unknown ids are not an error.
    async fn dequeue(&self, task_id: TaskId) -> Result<(), CourierError>;
}

/// Source of due invocations for an in-process worker group.
#[async_trait]
pub trait InvocationSource: Send + Sync {
    /// Wait until a task is due. `None` means the source is closed.
    async fn next_invocation(&self) -> Option<Invocation>;
}
