//! MonitorLoop - 定期配送される監視タスク本体
//!
//! 1 回の呼び出しで行うこと:
//! 1. セッショントークンの照合（不一致・欠落ならタスクを消して終了）
//! 2. 重複起動の検出（直近 `duplicate_window` 以内に開始済みなら終了）
//! 3. セッション開始時刻の記録
//! 4. pending セットを古い順に処理し、終端ステータスを決着させる
//! 5. 空ならタスクを消して終了
//!
//! 最後の配送が重複起動やロック競合で早期終了した場合も、作業が残っていれば
//! `rearm_if_work_left` でセッションを張り直します。
//!
//! ガード（SingleFlightGuard）の取得・解放は呼び出し側（Orchestrator）の責務です。

use std::sync::Arc;
use std::time::Duration;

use crate::app::rearm::MonitorArming;
use crate::app::resolver::StatusResolver;
use crate::app::settle::Settler;
use crate::config::MonitorKeys;
use crate::domain::{
    Chain, CourierError, DrainReport, Invocation, MonitorArgs, MonitorOutcome, SessionToken,
    StoredTransaction, TaskId,
};
use crate::ports::{Clock, KeyValueStore, PendingStore, TaskQueue};

pub struct MonitorLoop {
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) queue: Arc<dyn TaskQueue>,
    pub(crate) pending: Arc<dyn PendingStore>,
    pub(crate) resolver: StatusResolver,
    pub(crate) settler: Settler,
    pub(crate) arming: Arc<MonitorArming>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) keys: MonitorKeys,
    pub(crate) chain: Chain,
    pub(crate) duplicate_window: Duration,
    pub(crate) local_mode: bool,
}

impl MonitorLoop {
    pub async fn run(&self, invocation: &Invocation) -> Result<MonitorOutcome, CourierError> {
        let task_id = invocation.task_id();

        let Some(persisted) = self.store.get(&self.keys.token()).await? else {
            tracing::error!(%task_id, "no session token persisted, exiting");
            self.delete_task(task_id).await;
            return Ok(MonitorOutcome::NoSession);
        };
        let args = match invocation.decode::<MonitorArgs>() {
            Ok(args) => args,
            Err(error) => {
                tracing::error!(%task_id, %error, "undecodable monitor arguments, exiting");
                self.delete_task(task_id).await;
                return Ok(MonitorOutcome::NoSession);
            }
        };
        if persisted.parse::<SessionToken>().ok() != Some(args.token) {
            tracing::info!(%task_id, token = %args.token, "session token replaced, exiting");
            self.delete_task(task_id).await;
            return Ok(MonitorOutcome::Superseded);
        }

        if self.is_duplicate_invocation().await? {
            if !self.local_mode {
                tracing::warn!(%task_id, "duplicate invocation detected, exiting");
                self.rearm_if_work_left(invocation).await;
                return Ok(MonitorOutcome::DuplicateInvocation);
            }
            tracing::warn!(%task_id, "duplicate invocation detected, continuing in local mode");
        }

        let now = self.clock.now_millis();
        self.store
            .set(&self.keys.session_started(), Some(now.to_string()))
            .await?;

        let mut records = self.pending.list(self.chain).await?;
        if records.is_empty() {
            tracing::info!(%task_id, "no transactions to process, deleting task");
            self.retire(task_id).await?;
            return Ok(MonitorOutcome::Idle);
        }
        StoredTransaction::sort_oldest_first(&mut records);
        tracing::info!(
            %task_id,
            count = records.len(),
            oldest = %records[0].time_received,
            "processing pending transactions"
        );

        let report = self.drain(&records).await;

        if report.remaining() > 0 && invocation.is_last_delivery() {
            tracing::info!(%task_id, remaining = report.remaining(), "task exhausted with work left, re-arming");
            if let Err(error) = self.arming.arm().await {
                tracing::error!(%task_id, %error, "failed to re-arm monitor task");
            }
        }

        Ok(MonitorOutcome::Drained(report))
    }

    /// Re-arm when a last delivery of the current session exits without draining.
    ///
    /// Errors are logged; the caller has already decided its outcome.
    pub(crate) async fn rearm_if_work_left(&self, invocation: &Invocation) {
        if !invocation.is_last_delivery() {
            return;
        }
        let task_id = invocation.task_id();
        match self.work_left(invocation).await {
            Ok(0) => {}
            Ok(remaining) => {
                tracing::info!(%task_id, remaining, "last delivery exited early with work left, re-arming");
                if let Err(error) = self.arming.arm().await {
                    tracing::error!(%task_id, %error, "failed to re-arm monitor task");
                }
            }
            Err(error) => tracing::error!(%task_id, %error, "failed to inspect pending set before re-arming"),
        }
    }

    /// Pending records left for this chain, or 0 when the invocation is not the current session.
    async fn work_left(&self, invocation: &Invocation) -> Result<usize, CourierError> {
        let Ok(args) = invocation.decode::<MonitorArgs>() else {
            return Ok(0);
        };
        let persisted = self.store.get(&self.keys.token()).await?;
        if persisted.and_then(|raw| raw.parse::<SessionToken>().ok()) != Some(args.token) {
            return Ok(0);
        }
        let records = self.pending.list(self.chain).await?;
        Ok(records.iter().filter(|r| r.transaction.chain == self.chain).count())
    }

    async fn is_duplicate_invocation(&self) -> Result<bool, CourierError> {
        let Some(raw) = self.store.get(&self.keys.session_started()).await? else {
            return Ok(false);
        };
        let Ok(started) = raw.trim().parse::<i64>() else {
            return Ok(false);
        };
        let window = i64::try_from(self.duplicate_window.as_millis()).unwrap_or(i64::MAX);
        Ok(self.clock.now_millis().saturating_sub(started) < window)
    }

    async fn drain(&self, records: &[StoredTransaction]) -> DrainReport {
        let mut report = DrainReport::default();
        for record in records {
            let tx = &record.transaction;
            if tx.chain != self.chain {
                tracing::debug!(hash = %tx.hash, chain = %tx.chain, "skipping transaction for another chain");
                report.skipped += 1;
                continue;
            }

            let status = self.resolver.resolve(record).await;
            if !status.is_terminal() {
                tracing::info!(hash = %tx.hash, "transaction is pending");
                report.record(status);
                continue;
            }

            match self.settler.settle(record, status).await {
                Ok(()) => report.record(status),
                Err(error) => {
                    tracing::error!(hash = %tx.hash, %status, %error, "failed to settle transaction");
                    report.errors += 1;
                }
            }
        }
        report
    }

    /// Delete the recurring task and forget it if it is the recorded one.
    async fn retire(&self, task_id: TaskId) -> Result<(), CourierError> {
        self.queue.dequeue(task_id).await?;
        let recorded = self.store.get(&self.keys.task_id()).await?;
        if recorded.as_deref() == Some(task_id.to_string().as_str()) {
            self.store.set(&self.keys.task_id(), None).await?;
        }
        Ok(())
    }

    async fn delete_task(&self, task_id: TaskId) {
        if let Err(error) = self.queue.dequeue(task_id).await {
            tracing::warn!(%task_id, %error, "failed to delete monitor task");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::app::testkit::{Harness, harness, harness_with};
    use crate::config::{MonitorKeys, OrchestratorConfig};
    use crate::domain::{Chain, DrainReport, MonitorOutcome, Resolution, SessionToken, TxStatus};
    use crate::ports::{KeyValueStore, TaskQueue};

    const TEN_MINUTES: Duration = Duration::from_secs(600);
    const THREE_HOURS: Duration = Duration::from_secs(3 * 60 * 60);

    fn keys() -> MonitorKeys {
        MonitorKeys::new("nft-agent")
    }

    async fn run_armed(h: &Harness) -> MonitorOutcome {
        let (invocation, _) = h.armed_invocation().await;
        h.orchestrator.monitor().run(&invocation).await.unwrap()
    }

    #[tokio::test]
    async fn missing_token_deletes_the_task() {
        let h = harness();
        let (invocation, _) = h.armed_invocation().await;
        h.kv.set(&keys().token(), None).await.unwrap();

        let outcome = h.orchestrator.monitor().run(&invocation).await.unwrap();

        assert_eq!(outcome, MonitorOutcome::NoSession);
        assert!(h.queue.active_ids().await.is_empty());
    }

    #[tokio::test]
    async fn replaced_token_supersedes_the_older_session() {
        let h = harness();
        let (first, _) = h.armed_invocation().await;
        let (second, _) = h.armed_invocation().await;

        let outcome = h.orchestrator.monitor().run(&first).await.unwrap();

        assert_eq!(outcome, MonitorOutcome::Superseded);
        assert_eq!(h.queue.active_ids().await, vec![second.task_id()]);
    }

    #[tokio::test]
    async fn empty_pending_set_retires_the_session() {
        let h = harness();

        let outcome = run_armed(&h).await;

        assert_eq!(outcome, MonitorOutcome::Idle);
        assert!(h.queue.active_ids().await.is_empty());
        assert_eq!(h.kv_get(&keys().task_id()).await, None);
    }

    #[tokio::test]
    async fn drains_oldest_first_and_settles_terminal_statuses() {
        let h = harness();
        h.insert("5Jold", Chain::MinaDevnet, THREE_HOURS).await;
        h.insert("5Japplied", Chain::MinaDevnet, TEN_MINUTES).await;
        h.insert("5Jwaiting", Chain::MinaDevnet, TEN_MINUTES).await;
        h.node.answer("5Japplied", Resolution::Resolved(TxStatus::Applied)).await;

        let outcome = run_armed(&h).await;

        assert_eq!(
            outcome,
            MonitorOutcome::Drained(DrainReport {
                applied: 1,
                replaced: 1,
                pending: 1,
                ..DrainReport::default()
            })
        );
        assert_eq!(h.pending_hashes(Chain::MinaDevnet).await, vec!["5Jwaiting"]);

        let applied = h.sink.latest("5Japplied").await.unwrap();
        assert_eq!(applied.custom["status"], "applied");
        assert_eq!(applied.settlement_txs[0].chain, "mina:devnet");

        let snapshot = h.archive.json("mina:devnet-replaced-5Jold.json").await.unwrap();
        assert_eq!(snapshot["status"], "replaced");
        assert_eq!(snapshot["hash"], "5Jold");
        assert!(h.archive.json("mina:devnet-replaced-5Japplied.json").await.is_none());

        // the session stays armed while work remains
        assert_eq!(h.queue.active_ids().await.len(), 1);
        assert!(h.kv_get(&keys().session_started()).await.is_some());
    }

    #[tokio::test]
    async fn settled_records_are_not_queried_again() {
        let h = harness();
        h.insert("5Japplied", Chain::MinaDevnet, TEN_MINUTES).await;
        h.insert("5Jwaiting", Chain::MinaDevnet, TEN_MINUTES).await;
        h.node.answer("5Japplied", Resolution::Resolved(TxStatus::Applied)).await;
        let (invocation, _) = h.armed_invocation().await;

        h.orchestrator.monitor().run(&invocation).await.unwrap();
        assert_eq!(h.node.calls(), 2);

        h.clock.advance(Duration::from_secs(300));
        h.orchestrator.monitor().run(&invocation).await.unwrap();

        assert_eq!(h.node.calls(), 3);
        assert_eq!(h.sink.records().await.len(), 1);
    }

    #[tokio::test]
    async fn second_start_within_window_is_a_duplicate() {
        let h = harness();
        h.insert("5Jwaiting", Chain::MinaDevnet, TEN_MINUTES).await;
        let (invocation, _) = h.armed_invocation().await;
        let monitor = h.orchestrator.monitor();

        assert!(matches!(monitor.run(&invocation).await.unwrap(), MonitorOutcome::Drained(_)));

        h.clock.advance(Duration::from_secs(30));
        assert_eq!(monitor.run(&invocation).await.unwrap(), MonitorOutcome::DuplicateInvocation);

        h.clock.advance(Duration::from_secs(31));
        assert!(matches!(monitor.run(&invocation).await.unwrap(), MonitorOutcome::Drained(_)));
    }

    #[tokio::test]
    async fn local_mode_ignores_duplicate_starts() {
        let h = harness_with(OrchestratorConfig {
            local_mode: true,
            ..OrchestratorConfig::for_chain(Chain::MinaDevnet)
        });
        h.insert("5Jwaiting", Chain::MinaDevnet, TEN_MINUTES).await;
        let (invocation, _) = h.armed_invocation().await;
        let monitor = h.orchestrator.monitor();

        monitor.run(&invocation).await.unwrap();
        let outcome = monitor.run(&invocation).await.unwrap();

        assert!(matches!(outcome, MonitorOutcome::Drained(report) if report.pending == 1));
    }

    #[tokio::test]
    async fn unreadable_session_start_is_not_a_duplicate() {
        let h = harness();
        h.insert("5Jwaiting", Chain::MinaDevnet, TEN_MINUTES).await;
        let (invocation, _) = h.armed_invocation().await;
        h.kv.set(&keys().session_started(), Some("yesterday".into())).await.unwrap();

        let outcome = h.orchestrator.monitor().run(&invocation).await.unwrap();

        assert!(matches!(outcome, MonitorOutcome::Drained(_)));
    }

    #[tokio::test]
    async fn last_delivery_with_work_left_rearms() {
        let h = harness();
        h.insert("5Jwaiting", Chain::MinaDevnet, TEN_MINUTES).await;
        let (invocation, token) = h.armed_invocation().await;
        // the queue drops the entry when it hands out the last delivery
        h.queue.dequeue(invocation.task_id()).await.unwrap();

        let outcome = h
            .orchestrator
            .monitor()
            .run(&invocation.clone().with_last_delivery(true))
            .await
            .unwrap();

        assert!(matches!(outcome, MonitorOutcome::Drained(_)));
        let active = h.queue.active_ids().await;
        assert_eq!(active.len(), 1);
        assert_ne!(active[0], invocation.task_id());
        let persisted: SessionToken = h.kv_get(&keys().token()).await.unwrap().parse().unwrap();
        assert_ne!(persisted, token);
    }

    #[tokio::test]
    async fn duplicate_last_delivery_with_work_left_rearms() {
        let h = harness();
        h.insert("5Jwaiting", Chain::MinaDevnet, TEN_MINUTES).await;
        let (invocation, token) = h.armed_invocation().await;
        let monitor = h.orchestrator.monitor();
        assert!(matches!(monitor.run(&invocation).await.unwrap(), MonitorOutcome::Drained(_)));

        h.clock.advance(Duration::from_secs(30));
        h.queue.dequeue(invocation.task_id()).await.unwrap();
        let outcome = monitor
            .run(&invocation.clone().with_last_delivery(true))
            .await
            .unwrap();

        assert_eq!(outcome, MonitorOutcome::DuplicateInvocation);
        let active = h.queue.active_ids().await;
        assert_eq!(active.len(), 1);
        assert_ne!(active[0], invocation.task_id());
        let persisted: SessionToken = h.kv_get(&keys().token()).await.unwrap().parse().unwrap();
        assert_ne!(persisted, token);
        assert_eq!(h.pending_hashes(Chain::MinaDevnet).await, vec!["5Jwaiting"]);
    }

    #[tokio::test]
    async fn duplicate_delivery_that_is_not_last_does_not_rearm() {
        let h = harness();
        h.insert("5Jwaiting", Chain::MinaDevnet, TEN_MINUTES).await;
        let (invocation, token) = h.armed_invocation().await;
        let monitor = h.orchestrator.monitor();
        monitor.run(&invocation).await.unwrap();

        h.clock.advance(Duration::from_secs(30));
        monitor.run(&invocation).await.unwrap();

        assert_eq!(h.queue.active_ids().await, vec![invocation.task_id()]);
        let persisted: SessionToken = h.kv_get(&keys().token()).await.unwrap().parse().unwrap();
        assert_eq!(persisted, token);
    }

    #[tokio::test]
    async fn last_delivery_with_nothing_pending_does_not_rearm() {
        let h = harness();
        h.insert("5Japplied", Chain::MinaDevnet, TEN_MINUTES).await;
        h.node.answer("5Japplied", Resolution::Resolved(TxStatus::Applied)).await;
        let (invocation, _) = h.armed_invocation().await;
        h.queue.dequeue(invocation.task_id()).await.unwrap();

        h.orchestrator
            .monitor()
            .run(&invocation.with_last_delivery(true))
            .await
            .unwrap();

        assert!(h.queue.active_ids().await.is_empty());
    }

    #[tokio::test]
    async fn publish_failure_keeps_the_record_for_the_next_run() {
        let h = harness();
        h.insert("5Jfails", Chain::MinaDevnet, TEN_MINUTES).await;
        h.node.answer("5Jfails", Resolution::Resolved(TxStatus::Failed)).await;
        h.sink.fail_next(1).await;

        let outcome = run_armed(&h).await;

        assert!(matches!(outcome, MonitorOutcome::Drained(report) if report.errors == 1));
        assert_eq!(h.pending_hashes(Chain::MinaDevnet).await, vec!["5Jfails"]);
    }
}
