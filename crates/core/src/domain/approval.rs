use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::circuit::LevelId;
use crate::domain::request::{RequestId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

/// Per-approver decision state.
///
/// `Waiting` rows belong to levels the circuit has not reached yet;
/// `Returned` rows were sent back by a later level and can be re-activated.
/// `Moot` marks rows left behind when a rejection terminates the request,
/// so no approval ever dangles in `Pending` on a closed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Waiting,
    Pending,
    Approved,
    Rejected,
    Returned,
    Moot,
}

impl ApprovalState {
    pub fn is_decided(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Returned)
    }
}

/// One ledger entry per (request, level, approver). The level sequence is
/// cached on the row so rank scans never need the circuit definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub request_id: RequestId,
    pub level_id: LevelId,
    pub level_sequence: i32,
    pub approver: UserId,
    pub state: ApprovalState,
    pub comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
