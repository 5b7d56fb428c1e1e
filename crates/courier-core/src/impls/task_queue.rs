//! In-process recurring task queue.
//!
//! ホスト側スケジューラの代わりにプロセス内で監視タスクを定期配送します。
//! 登録されたタスクは `interval` ごとに Invocation として配送され、
//! `dequeue` されるか `max_attempts` 回配送されると消えます。

use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::{CourierError, Invocation, TaskId, TaskRequest};
use crate::ports::{IdGenerator, InvocationSource, TaskQueue};

/// Scheduled delivery entry.
///
/// Reverse ordering so BinaryHeap acts as a min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledTask {
    next_run_at: Instant,
    task_id: TaskId,
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.next_run_at.cmp(&self.next_run_at)
    }
}

struct Entry {
    request: TaskRequest,
    deliveries: u32,
    next_run_at: Instant,
}

#[derive(Default)]
struct QueueState {
    entries: HashMap<TaskId, Entry>,
    /// May hold stale entries for dequeued or rescheduled tasks; they are
    /// dropped when popped.
    scheduled: BinaryHeap<ScheduledTask>,
    closed: bool,
}

impl QueueState {
    /// Pop the next due task, rescheduling or retiring it.
    fn take_due(&mut self, now: Instant, interval: Duration) -> Option<Invocation> {
        while let Some(head) = self.scheduled.peek() {
            if head.next_run_at > now {
                return None;
            }
            let Some(head) = self.scheduled.pop() else {
                return None;
            };
            let Some(entry) = self.entries.get_mut(&head.task_id) else {
                continue;
            };
            if entry.next_run_at != head.next_run_at {
                continue;
            }

            entry.deliveries += 1;
            let last = entry.deliveries >= entry.request.max_attempts;
            let invocation =
                Invocation::new(head.task_id, entry.request.kind.clone(), entry.request.args.clone())
                    .with_last_delivery(last);

            if last {
                tracing::debug!(task_id = %head.task_id, deliveries = entry.deliveries, "task reached max attempts");
                self.entries.remove(&head.task_id);
            } else {
                entry.next_run_at = now + interval;
                self.scheduled.push(ScheduledTask {
                    next_run_at: entry.next_run_at,
                    task_id: head.task_id,
                });
            }
            return Some(invocation);
        }
        None
    }

    fn next_wake(&self) -> Option<Instant> {
        self.scheduled.peek().map(|entry| entry.next_run_at)
    }
}

pub struct InMemoryTaskQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    ids: Arc<dyn IdGenerator>,
    interval: Duration,
}

impl InMemoryTaskQueue {
    /// `interval` is both the delay before the first delivery and between deliveries.
    pub fn new(ids: Arc<dyn IdGenerator>, interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
            ids,
            interval,
        }
    }

    /// Ids of tasks that will still be delivered.
    pub async fn active_ids(&self) -> Vec<TaskId> {
        let state = self.state.lock().await;
        let mut ids: Vec<_> = state.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    pub async fn request(&self, task_id: TaskId) -> Option<TaskRequest> {
        let state = self.state.lock().await;
        state.entries.get(&task_id).map(|e| e.request.clone())
    }

    /// Wake every waiter; `next_invocation` returns `None` from now on.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, request: TaskRequest) -> Result<TaskId, CourierError> {
        if request.max_attempts == 0 {
            return Err(CourierError::Queue("max_attempts must be positive".into()));
        }
        let task_id = self.ids.generate_task_id();
        let next_run_at = Instant::now() + self.interval;
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(CourierError::Queue("queue is closed".into()));
            }
            state.entries.insert(
                task_id,
                Entry {
                    request,
                    deliveries: 0,
                    next_run_at,
                },
            );
            state.scheduled.push(ScheduledTask {
                next_run_at,
                task_id,
            });
        }
        // Notify outside the lock
        self.notify.notify_one();
        tracing::debug!(%task_id, "task enqueued");
        Ok(task_id)
    }

    async fn dequeue(&self, task_id: TaskId) -> Result<(), CourierError> {
        let removed = self.state.lock().await.entries.remove(&task_id).is_some();
        tracing::debug!(%task_id, removed, "task dequeued");
        Ok(())
    }
}

#[async_trait]
impl InvocationSource for InMemoryTaskQueue {
    async fn next_invocation(&self) -> Option<Invocation> {
        loop {
            let notified = self.notify.notified();
            let next_wake = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return None;
                }
                if let Some(invocation) = state.take_due(Instant::now(), self.interval) {
                    return Some(invocation);
                }
                state.next_wake()
            };

            // Wait for notification OR next scheduled delivery
            if let Some(wake_time) = next_wake {
                tokio::select! {
                    _ = notified => {},
                    _ = tokio::time::sleep_until(wake_time) => {},
                }
            } else {
                notified.await;
            }
        }
    }
}
