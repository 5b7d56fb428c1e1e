//! Orchestrator configuration.
//!
//! The staleness thresholds depend on how fast the target network confirms
//! transactions, so they are defaults rather than constants.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{Chain, CourierError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub chain: Chain,

    /// Names the monitoring lineage; prefixes every key in the KV store.
    pub lineage: String,

    /// Owner recorded on queued monitor tasks.
    pub owner_id: String,

    /// A lock older than this is considered abandoned.
    pub lock_stale_secs: u64,

    /// A session started less than this ago means a duplicate invocation.
    pub duplicate_window_secs: u64,

    /// Pending records older than this with no verdict become `replaced`.
    pub replace_after_secs: u64,

    pub submit_timeout_secs: u64,
    pub broadcast_backoff_secs: u64,

    /// Deliveries before the host gives up on a monitor task.
    pub monitor_max_attempts: u32,

    /// Delivery interval of the in-process task queue.
    pub monitor_interval_secs: u64,

    /// Local/diagnostic mode: no duplicate-invocation short-circuit, and
    /// accepted transactions wait for inclusion.
    pub local_mode: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chain: Chain::MinaDevnet,
            lineage: "nft-agent".to_string(),
            owner_id: "courier".to_string(),
            lock_stale_secs: 15 * 60,
            duplicate_window_secs: 60,
            replace_after_secs: 2 * 60 * 60,
            submit_timeout_secs: 60,
            broadcast_backoff_secs: 10,
            monitor_max_attempts: 72,
            monitor_interval_secs: 5 * 60,
            local_mode: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn for_chain(chain: Chain) -> Self {
        Self {
            chain,
            ..Self::default()
        }
    }

    pub fn lock_staleness(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }

    pub fn duplicate_window(&self) -> Duration {
        Duration::from_secs(self.duplicate_window_secs)
    }

    pub fn replace_after(&self) -> Duration {
        Duration::from_secs(self.replace_after_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn broadcast_backoff(&self) -> Duration {
        Duration::from_secs(self.broadcast_backoff_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn validate(&self) -> Result<(), CourierError> {
        if self.lineage.trim().is_empty() {
            return Err(CourierError::Config("lineage must not be empty".into()));
        }
        if self.lock_stale_secs == 0 || self.replace_after_secs == 0 {
            return Err(CourierError::Config(
                "lock_stale_secs and replace_after_secs must be positive".into(),
            ));
        }
        if self.broadcast_backoff_secs == 0 {
            return Err(CourierError::Config("broadcast_backoff_secs must be positive".into()));
        }
        if self.monitor_interval_secs == 0 {
            return Err(CourierError::Config("monitor_interval_secs must be positive".into()));
        }
        if self.monitor_interval_secs < self.duplicate_window_secs {
            return Err(CourierError::Config(
                "monitor_interval_secs must not be shorter than duplicate_window_secs".into(),
            ));
        }
        if self.monitor_max_attempts == 0 {
            return Err(CourierError::Config("monitor_max_attempts must be positive".into()));
        }
        Ok(())
    }
}

/// Keys of one monitoring lineage in the KV store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorKeys {
    lineage: String,
}

impl MonitorKeys {
    pub fn new(lineage: impl Into<String>) -> Self {
        Self {
            lineage: lineage.into(),
        }
    }

    pub fn lock(&self, task_id: &str) -> String {
        format!("{}.task.status.{task_id}", self.lineage)
    }

    pub fn token(&self) -> String {
        format!("{}.txToken", self.lineage)
    }

    pub fn task_id(&self) -> String {
        format!("{}.txTask.txId", self.lineage)
    }

    pub fn session_started(&self) -> String {
        format!("{}.txTask.timeStarted", self.lineage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.lock_staleness(), Duration::from_secs(900));
        assert_eq!(config.duplicate_window(), Duration::from_secs(60));
        assert_eq!(config.replace_after(), Duration::from_secs(7200));
        assert_eq!(config.submit_timeout(), Duration::from_secs(60));
        assert_eq!(config.broadcast_backoff(), Duration::from_secs(10));
        assert_eq!(config.monitor_max_attempts, 72);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: OrchestratorConfig =
            serde_json::from_str(r#"{ "chain": "mina:mainnet", "replace_after_secs": 600 }"#)
                .unwrap();
        assert_eq!(config.chain, Chain::MinaMainnet);
        assert_eq!(config.replace_after(), Duration::from_secs(600));
        assert_eq!(config.lock_stale_secs, 900);
    }

    #[test]
    fn zero_backoff_is_rejected() {
        let config = OrchestratorConfig {
            broadcast_backoff_secs: 0,
            ..OrchestratorConfig::default()
        };
        assert!(config.validate().unwrap_err().is_fatal());
    }

    #[rstest]
    #[case::zero_interval(0, 0)]
    #[case::interval_inside_duplicate_window(30, 60)]
    fn monitor_interval_must_outlast_the_duplicate_window(#[case] interval: u64, #[case] window: u64) {
        let config = OrchestratorConfig {
            monitor_interval_secs: interval,
            duplicate_window_secs: window,
            ..OrchestratorConfig::default()
        };
        assert!(config.validate().unwrap_err().is_fatal());
    }

    #[test]
    fn interval_equal_to_duplicate_window_is_accepted() {
        let config = OrchestratorConfig {
            monitor_interval_secs: 60,
            duplicate_window_secs: 60,
            ..OrchestratorConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn keys_are_namespaced_by_lineage() {
        let keys = MonitorKeys::new("nft-agent");
        assert_eq!(keys.token(), "nft-agent.txToken");
        assert_eq!(keys.lock("task-1"), "nft-agent.task.status.task-1");
        assert_ne!(MonitorKeys::new("other").token(), keys.token());
    }
}
