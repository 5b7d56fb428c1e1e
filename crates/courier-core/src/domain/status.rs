//! Settlement and broadcast status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Settlement status of a submitted transaction.
///
/// State transitions:
/// - Pending -> Applied   (an oracle reports success)
/// - Pending -> Failed    (an oracle reports explicit failure)
/// - Pending -> Replaced  (no resolution within the replacement window)
/// - Pending -> Pending   (inconclusive, still inside the window)
///
/// Terminal statuses are never re-queried: the record leaves the pending set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Applied,
    Replaced,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Applied | TxStatus::Replaced | TxStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Applied => "applied",
            TxStatus::Replaced => "replaced",
            TxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a status string is not one of the four statuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transaction status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TxStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TxStatus::Pending),
            "applied" => Ok(TxStatus::Applied),
            "replaced" => Ok(TxStatus::Replaced),
            "failed" => Ok(TxStatus::Failed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Answer of a single oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The oracle reported an explicit status, `pending` included.
    Resolved(TxStatus),
    /// The oracle cannot tell; ask the next one.
    Inconclusive,
}

impl Resolution {
    pub fn status(self) -> Option<TxStatus> {
        match self {
            Resolution::Resolved(status) => Some(status),
            Resolution::Inconclusive => None,
        }
    }

    pub fn is_resolved(self) -> bool {
        self.status().is_some()
    }
}

/// Outcome of one broadcast attempt as reported by the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastStatus {
    /// Accepted into the network's inbound queue.
    Pending,
    Rejected,
}

impl BroadcastStatus {
    pub fn is_accepted(self) -> bool {
        self == BroadcastStatus::Pending
    }
}

impl fmt::Display for BroadcastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastStatus::Pending => f.write_str("pending"),
            BroadcastStatus::Rejected => f.write_str("rejected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TxStatus::Pending, false)]
    #[case(TxStatus::Applied, true)]
    #[case(TxStatus::Replaced, true)]
    #[case(TxStatus::Failed, true)]
    fn terminal_statuses(#[case] status: TxStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn parses_indexer_spelling() {
        assert_eq!("applied".parse::<TxStatus>(), Ok(TxStatus::Applied));
        assert_eq!(" Failed ".parse::<TxStatus>(), Ok(TxStatus::Failed));
        assert!("included".parse::<TxStatus>().is_err());
    }

    #[test]
    fn broadcast_status_serializes_lowercase() {
        let json = serde_json::to_string(&BroadcastStatus::Rejected).unwrap();
        assert_eq!(json, "\"rejected\"");
        assert!(BroadcastStatus::Pending.is_accepted());
    }
}
