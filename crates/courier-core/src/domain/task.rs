use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::errors::CourierError;
use super::ids::{SessionToken, TaskId};

/// A task kind and the shape of its arguments.
///
/// # 命名規約
/// - `{namespace}.{domain}.{action}.v{major}`
pub trait TaskKind: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: &'static str;
}

/// Request for a new recurring entry in the Task Queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub kind: String,
    pub args: serde_json::Value,
    pub max_attempts: u32,
    pub metadata: String,
    pub owner_id: String,
}

impl TaskRequest {
    pub fn new<T: TaskKind>(
        args: &T,
        max_attempts: u32,
        metadata: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Result<Self, CourierError> {
        Ok(Self {
            kind: T::KIND.to_string(),
            args: serde_json::to_value(args)?,
            max_attempts,
            metadata: metadata.into(),
            owner_id: owner_id.into(),
        })
    }
}

/// One delivery of a queued task back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    task_id: TaskId,
    kind: String,
    args: serde_json::Value,
    /// The queue will not deliver this task again.
    #[serde(default)]
    last_delivery: bool,
}

impl Invocation {
    pub fn new(task_id: TaskId, kind: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            task_id,
            kind: kind.into(),
            args,
            last_delivery: false,
        }
    }

    pub fn with_last_delivery(mut self, last_delivery: bool) -> Self {
        self.last_delivery = last_delivery;
        self
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn args(&self) -> &serde_json::Value {
        &self.args
    }

    pub fn is_last_delivery(&self) -> bool {
        self.last_delivery
    }

    pub fn is<T: TaskKind>(&self) -> bool {
        self.kind == T::KIND
    }

    pub fn decode<T: TaskKind>(&self) -> Result<T, CourierError> {
        Ok(serde_json::from_value(self.args.clone())?)
    }
}

/// Arguments of the recurring monitor task: the session it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorArgs {
    pub token: SessionToken,
}

impl TaskKind for MonitorArgs {
    const KIND: &'static str = "courier.tx.monitor.v1";
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn monitor_args_roundtrip_through_invocation() {
        let token = SessionToken::from_ulid(Ulid::new());
        let request = TaskRequest::new(&MonitorArgs { token }, 72, "tx processing", "owner").unwrap();
        assert_eq!(request.kind, MonitorArgs::KIND);

        let invocation = Invocation::new(TaskId::from_ulid(Ulid::new()), request.kind, request.args);
        assert!(invocation.is::<MonitorArgs>());
        assert_eq!(invocation.decode::<MonitorArgs>().unwrap().token, token);
    }

    #[test]
    fn garbage_args_fail_to_decode() {
        let invocation = Invocation::new(
            TaskId::from_ulid(Ulid::new()),
            MonitorArgs::KIND,
            serde_json::json!({"txToken": 12}),
        );
        assert!(invocation.decode::<MonitorArgs>().is_err());
    }
}
