use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::orchestrator::Orchestrator;
use crate::ports::InvocationSource;

/// Worker group handle.
/// - `request_shutdown()` で新しい配送の受け取りを止める
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers pulling from `source`.
    pub fn spawn(n: usize, source: Arc<dyn InvocationSource>, orchestrator: Arc<Orchestrator>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let source = Arc::clone(&source);
            let orchestrator = Arc::clone(&orchestrator);
            let mut rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, source, orchestrator, &mut rx).await;
            }));
        }

        Self { shutdown_tx, joins }
    }

    /// In-flight tasks run to completion; only new deliveries stop.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    source: Arc<dyn InvocationSource>,
    orchestrator: Arc<Orchestrator>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let invocation = tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender dropped
                if changed.is_err() {
                    break;
                }
                continue;
            }
            invocation = source.next_invocation() => invocation,
        };

        let Some(invocation) = invocation else {
            tracing::info!(worker_id, "invocation source closed");
            break;
        };

        let task_id = invocation.task_id();
        match orchestrator.handle_task(&invocation).await {
            Ok(summary) => tracing::info!(worker_id, %task_id, %summary, "task finished"),
            Err(error) => tracing::error!(worker_id, %task_id, %error, "task aborted"),
        }
    }
}
