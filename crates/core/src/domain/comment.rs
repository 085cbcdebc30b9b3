use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::approval::ApprovalId;
use crate::domain::request::{RequestId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    ApprovalNote,
    RejectionReason,
    Return,
    Clarification,
    Response,
    Information,
}

/// Append-only exchange record on a request. Comments are never edited or
/// deleted after creation; auditors rely on the chronological order of
/// `created_at` and the monotonic `exchange_number`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub request_id: RequestId,
    pub approval_id: Option<ApprovalId>,
    pub author: UserId,
    pub kind: CommentKind,
    pub subject: Option<String>,
    pub message: String,
    /// Level sequence of the author at the time of writing.
    pub author_level_sequence: Option<i32>,
    pub returned_from_level: Option<i32>,
    pub returned_to_level: Option<i32>,
    pub exchange_number: u32,
    pub created_at: DateTime<Utc>,
}
