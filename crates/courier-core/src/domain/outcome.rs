//! Outcome of one monitor invocation.
//!
//! Every variant is a normal termination; the host only sees the summary string.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::status::TxStatus;

/// Tally of one pass over the pending set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub applied: usize,
    pub replaced: usize,
    pub failed: usize,
    pub pending: usize,
    /// Records whose processing raised an error; they stay pending.
    pub errors: usize,
    /// Records for another chain, left untouched.
    pub skipped: usize,
}

impl DrainReport {
    pub fn record(&mut self, status: TxStatus) {
        match status {
            TxStatus::Applied => self.applied += 1,
            TxStatus::Replaced => self.replaced += 1,
            TxStatus::Failed => self.failed += 1,
            TxStatus::Pending => self.pending += 1,
        }
    }

    pub fn settled(&self) -> usize {
        self.applied + self.replaced + self.failed
    }

    /// Records that will be looked at again by the next invocation.
    pub fn remaining(&self) -> usize {
        self.pending + self.errors
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MonitorOutcome {
    /// Another invocation holds the single-flight lock.
    AlreadyRunning,
    /// No session token is persisted, or the arguments could not be decoded.
    NoSession,
    /// A newer session replaced the one this invocation belongs to.
    Superseded,
    /// A session started less than the duplicate window ago.
    DuplicateInvocation,
    /// Nothing left to monitor; the recurring task was deleted.
    Idle,
    Drained(DrainReport),
}

impl fmt::Display for MonitorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorOutcome::AlreadyRunning => f.write_str("task is already running"),
            MonitorOutcome::NoSession => f.write_str("exiting monitor: no valid session"),
            MonitorOutcome::Superseded => f.write_str("exiting monitor: session token replaced"),
            MonitorOutcome::DuplicateInvocation => {
                f.write_str("exiting monitor: duplicate invocation")
            }
            MonitorOutcome::Idle => f.write_str("no transactions to process"),
            MonitorOutcome::Drained(report) => write!(
                f,
                "txs processed: applied={} replaced={} failed={} pending={} errors={}",
                report.applied, report.replaced, report.failed, report.pending, report.errors
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_tallies_statuses() {
        let mut report = DrainReport::default();
        report.record(TxStatus::Applied);
        report.record(TxStatus::Replaced);
        report.record(TxStatus::Pending);
        report.errors += 1;

        assert_eq!(report.settled(), 2);
        assert_eq!(report.remaining(), 2);
    }

    #[test]
    fn summary_strings() {
        assert_eq!(MonitorOutcome::Idle.to_string(), "no transactions to process");
        let drained = MonitorOutcome::Drained(DrainReport {
            applied: 1,
            ..DrainReport::default()
        });
        assert!(drained.to_string().starts_with("txs processed: applied=1"));
    }
}
