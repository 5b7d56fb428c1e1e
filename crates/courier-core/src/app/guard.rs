//! SingleFlightGuard - 同じタスクの並行実行を防ぐロック
//!
//! KV に「実行開始時刻」を書くだけのベストエフォートなロックです。
//! 比較交換がないので、ロックが stale のときに同時に来た 2 つの呼び出しは
//! 両方とも通ることがあります。その場合も後段の処理（公開・削除）は
//! 冪等なので結果は壊れません。
//!
//! # ルール
//! - ロックなし → 取得（現在時刻を書く）
//! - `lock_staleness` 未満のロック → 拒否
//! - 古い・読めないロック → 上書きして取得

use std::sync::Arc;
use std::time::Duration;

use crate::config::MonitorKeys;
use crate::domain::{CourierError, TaskId};
use crate::ports::{Clock, KeyValueStore};

pub struct SingleFlightGuard {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    keys: MonitorKeys,
    staleness: Duration,
}

impl SingleFlightGuard {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        keys: MonitorKeys,
        staleness: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            keys,
            staleness,
        }
    }

    /// Try to take the lock for `task_id`. `false` means another invocation is running.
    pub async fn claim(&self, task_id: &TaskId) -> Result<bool, CourierError> {
        let key = self.keys.lock(&task_id.to_string());
        let now = self.clock.now_millis();

        if let Some(raw) = self.store.get(&key).await? {
            match raw.trim().parse::<i64>() {
                Ok(started) if self.is_fresh(started, now) => {
                    tracing::info!(%task_id, started, "task is already running");
                    return Ok(false);
                }
                Ok(started) => {
                    tracing::warn!(%task_id, started, "reclaiming stale task lock");
                }
                Err(_) => {
                    tracing::warn!(%task_id, lock = %raw, "reclaiming unreadable task lock");
                }
            }
        }

        self.store.set(&key, Some(now.to_string())).await?;
        Ok(true)
    }

    pub async fn release(&self, task_id: &TaskId) -> Result<(), CourierError> {
        self.store.set(&self.keys.lock(&task_id.to_string()), None).await
    }

    fn is_fresh(&self, started: i64, now: i64) -> bool {
        let staleness = i64::try_from(self.staleness.as_millis()).unwrap_or(i64::MAX);
        now.saturating_sub(started) < staleness
    }
}
