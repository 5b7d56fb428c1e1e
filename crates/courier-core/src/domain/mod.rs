//! Domain model (IDs, chains, statuses, records, tasks, ...).
//!
//! 外部 I/O を一切持たない層です。ports / app はここの型だけを受け渡します。

pub mod chain;
pub mod errors;
pub mod ids;
pub mod metadata;
pub mod outcome;
pub mod status;
pub mod submission;
pub mod task;
pub mod transaction;

pub use chain::Chain;
pub use errors::{CourierError, ErrorKind};
pub use ids::{RecordId, SessionToken, TaskId};
pub use metadata::{MetadataRecord, SettlementRef, StorageRef};
pub use outcome::{DrainReport, MonitorOutcome};
pub use status::{BroadcastStatus, Resolution, TxStatus};
pub use submission::{BroadcastReceipt, SignedTransaction, SubmissionRequest, SubmissionResult};
pub use task::{Invocation, MonitorArgs, TaskKind, TaskRequest};
pub use transaction::{Operation, PendingTransaction, StoredTransaction};
