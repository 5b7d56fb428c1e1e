//! IdGenerator port - ID 生成の抽象化
//!
//! セッショントークンは ULID なので、後から発行したものほど大きくなります
//! （世代番号として比較できる）。

use crate::domain::ids::{RecordId, SessionToken, TaskId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は分散システムで使える ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    fn generate_session_token(&self) -> SessionToken;

    fn generate_record_id(&self) -> RecordId;
}

/// UlidGenerator は Clock の時刻を timestamp 部分に使う ULID 生成器
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        TaskId::from(self.next())
    }

    fn generate_session_token(&self) -> SessionToken {
        SessionToken::from(self.next())
    }

    fn generate_record_id(&self) -> RecordId {
        RecordId::from(self.next())
    }
}
