//! MonitorArming - 監視タスクの（再）登録
//!
//! 順序: トークン生成 → トークン保存 → 新タスク登録 → 新タスク ID 保存 → 旧タスク削除
//!
//! 新タスクが記録されてから旧タスクを消すので、途中でクラッシュしても
//! 「監視タスクがゼロ」にはなりません（重複は次回の配送でトークン不一致として消える）。

use std::sync::Arc;

use crate::config::MonitorKeys;
use crate::domain::{CourierError, MonitorArgs, SessionToken, TaskId, TaskRequest};
use crate::ports::{IdGenerator, KeyValueStore, TaskQueue};

pub struct MonitorArming {
    store: Arc<dyn KeyValueStore>,
    queue: Arc<dyn TaskQueue>,
    ids: Arc<dyn IdGenerator>,
    keys: MonitorKeys,
    max_attempts: u32,
    metadata: String,
    owner_id: String,
}

impl MonitorArming {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        queue: Arc<dyn TaskQueue>,
        ids: Arc<dyn IdGenerator>,
        keys: MonitorKeys,
        max_attempts: u32,
        lineage: &str,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            queue,
            ids,
            keys,
            max_attempts,
            metadata: format!("tx processing: {lineage}"),
            owner_id: owner_id.into(),
        }
    }

    /// Start a new monitoring session and retire the previous task.
    pub async fn arm(&self) -> Result<(TaskId, SessionToken), CourierError> {
        let token = self.ids.generate_session_token();
        self.store.set(&self.keys.token(), Some(token.to_string())).await?;

        let previous = self.recorded_task_id().await?;

        let request = TaskRequest::new(
            &MonitorArgs { token },
            self.max_attempts,
            self.metadata.clone(),
            self.owner_id.clone(),
        )?;
        let task_id = self.queue.enqueue(request).await?;
        self.store.set(&self.keys.task_id(), Some(task_id.to_string())).await?;
        tracing::info!(%task_id, %token, "monitor task armed");

        if let Some(previous) = previous.filter(|old| *old != task_id) {
            // The old task's token no longer matches, so it would exit on its own.
            if let Err(error) = self.queue.dequeue(previous).await {
                tracing::warn!(task_id = %previous, %error, "failed to delete previous monitor task");
            }
        }
        Ok((task_id, token))
    }

    async fn recorded_task_id(&self) -> Result<Option<TaskId>, CourierError> {
        let Some(raw) = self.store.get(&self.keys.task_id()).await? else {
            return Ok(None);
        };
        match raw.parse::<TaskId>() {
            Ok(id) => Ok(Some(id)),
            Err(error) => {
                tracing::warn!(recorded = %raw, %error, "ignoring unreadable monitor task id");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryKvStore, InMemoryTaskQueue};
    use crate::ports::{SystemClock, UlidGenerator};
    use std::time::Duration;

    struct Fixture {
        store: InMemoryKvStore,
        queue: Arc<InMemoryTaskQueue>,
        arming: MonitorArming,
    }

    fn fixture() -> Fixture {
        let store = InMemoryKvStore::new();
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(SystemClock));
        let queue = Arc::new(InMemoryTaskQueue::new(ids.clone(), Duration::from_secs(300)));
        let arming = MonitorArming::new(
            Arc::new(store.clone()),
            queue.clone(),
            ids,
            MonitorKeys::new("nft-agent"),
            72,
            "nft-agent",
            "owner-1",
        );
        Fixture { store, queue, arming }
    }

    #[tokio::test]
    async fn arm_records_token_and_task() {
        let f = fixture();

        let (task_id, token) = f.arming.arm().await.unwrap();

        let kv = f.store.snapshot().await;
        assert_eq!(kv["nft-agent.txToken"], token.to_string());
        assert_eq!(kv["nft-agent.txTask.txId"], task_id.to_string());

        let request = f.queue.request(task_id).await.unwrap();
        assert_eq!(request.max_attempts, 72);
        assert_eq!(request.metadata, "tx processing: nft-agent");
        assert_eq!(request.owner_id, "owner-1");
        let args: MonitorArgs = serde_json::from_value(request.args).unwrap();
        assert_eq!(args.token, token);
    }

    #[tokio::test]
    async fn repeated_arming_leaves_one_active_task() {
        let f = fixture();

        let mut last = None;
        for _ in 0..5 {
            last = Some(f.arming.arm().await.unwrap());
        }

        let (task_id, _) = last.unwrap();
        assert_eq!(f.queue.active_ids().await, vec![task_id]);
    }

    #[tokio::test]
    async fn each_arm_issues_a_new_token() {
        let f = fixture();

        let (_, first) = f.arming.arm().await.unwrap();
        let (_, second) = f.arming.arm().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(
            f.store.get("nft-agent.txToken").await.unwrap(),
            Some(second.to_string())
        );
    }

    #[tokio::test]
    async fn unreadable_previous_id_is_ignored() {
        let f = fixture();
        f.store
            .set("nft-agent.txTask.txId", Some("not-a-task".into()))
            .await
            .unwrap();

        let (task_id, _) = f.arming.arm().await.unwrap();
        assert_eq!(f.queue.active_ids().await, vec![task_id]);
    }
}
