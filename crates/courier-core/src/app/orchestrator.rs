//! Orchestrator - ホストから呼ばれる入口
//!
//! - `handle_task`: 定期配送されたタスクを、ガードを取ってから種別ごとに振り分ける
//! - `submit`: 署名済みトランザクションを送信して監視に渡す
//! - `arm_monitor`: 監視セッションを手動で張り直す

use std::sync::Arc;

use crate::app::guard::SingleFlightGuard;
use crate::app::monitor::MonitorLoop;
use crate::app::rearm::MonitorArming;
use crate::app::submission::SubmissionChannel;
use crate::config::OrchestratorConfig;
use crate::domain::{
    CourierError, Invocation, MonitorArgs, MonitorOutcome, SessionToken, SubmissionRequest,
    SubmissionResult, TaskId,
};

/// Summary returned when a task fails with a recoverable error or has an unknown kind.
pub const TASK_ERROR_SUMMARY: &str = "error in task";

pub struct Orchestrator {
    config: OrchestratorConfig,
    guard: SingleFlightGuard,
    monitor: MonitorLoop,
    submission: SubmissionChannel,
    arming: Arc<MonitorArming>,
}

impl Orchestrator {
    pub(crate) fn new(
        config: OrchestratorConfig,
        guard: SingleFlightGuard,
        monitor: MonitorLoop,
        submission: SubmissionChannel,
        arming: Arc<MonitorArming>,
    ) -> Self {
        Self {
            config,
            guard,
            monitor,
            submission,
            arming,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one delivered task under the single-flight guard.
    ///
    /// Only configuration/programming errors are returned as `Err`; every other
    /// failure is logged and reported through the summary string.
    pub async fn handle_task(&self, invocation: &Invocation) -> Result<String, CourierError> {
        let task_id = invocation.task_id();
        tracing::info!(%task_id, kind = invocation.kind(), "executing task");

        if !self.guard.claim(&task_id).await? {
            // the holder is not the last delivery, so nobody else would re-arm
            if invocation.is::<MonitorArgs>() {
                self.monitor.rearm_if_work_left(invocation).await;
            }
            return Ok(MonitorOutcome::AlreadyRunning.to_string());
        }

        let result = self.dispatch(invocation).await;

        if let Err(error) = self.guard.release(&task_id).await {
            tracing::error!(%task_id, %error, "failed to release task lock");
        }

        match result {
            Ok(summary) => Ok(summary),
            Err(error) if error.is_fatal() => {
                tracing::error!(%task_id, %error, "task failed with a fatal error");
                Err(error)
            }
            Err(error) => {
                tracing::error!(%task_id, %error, kind = ?error.kind(), "error in task");
                Ok(TASK_ERROR_SUMMARY.to_string())
            }
        }
    }

    async fn dispatch(&self, invocation: &Invocation) -> Result<String, CourierError> {
        if invocation.is::<MonitorArgs>() {
            let outcome = self.monitor.run(invocation).await?;
            tracing::info!(task_id = %invocation.task_id(), %outcome, "monitor finished");
            return Ok(outcome.to_string());
        }
        tracing::error!(task_id = %invocation.task_id(), kind = invocation.kind(), "unknown task kind");
        Ok(TASK_ERROR_SUMMARY.to_string())
    }

    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmissionResult, CourierError> {
        self.submission.submit(request).await
    }

    pub async fn arm_monitor(&self) -> Result<(TaskId, SessionToken), CourierError> {
        self.arming.arm().await
    }

    #[cfg(test)]
    pub(crate) fn monitor(&self) -> &MonitorLoop {
        &self.monitor
    }
}
