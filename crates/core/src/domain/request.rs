use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::circuit::CircuitId;
use crate::domain::workflow_type::WorkflowTypeId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Draft,
    Submitted,
    InProgress,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }

    /// Lifecycle table. Only `InProgress` is re-entrant; it is revisited
    /// every time a decision keeps the circuit open.
    pub fn can_transition(self, to: RequestState) -> bool {
        use RequestState::{Approved, Cancelled, Draft, InProgress, Rejected, Submitted};
        matches!(
            (self, to),
            (Draft, Submitted)
                | (Draft, Cancelled)
                | (Submitted, InProgress)
                | (InProgress, InProgress)
                | (InProgress, Approved)
                | (InProgress, Rejected)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    Urgent,
    Critical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    Salary,
    Housing,
    Consumption,
    Business,
    Other,
}

/// Payload of a bank credit application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditDossier {
    pub client_number: String,
    pub account_number: String,
    pub client_name: String,
    pub credit_kind: CreditKind,
    pub amount: Decimal,
    pub currency: String,
    pub duration_months: Option<u32>,
    pub priority: Priority,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailKind {
    Letter,
    Email,
    Report,
    Invoice,
    Request,
    Notification,
    Other,
}

/// Payload of an incoming piece of correspondence routed for review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrespondenceDossier {
    pub sender: String,
    pub origin: Option<String>,
    pub mail_kind: MailKind,
    pub received_on: NaiveDate,
    pub priority: Priority,
    pub instruction: Option<String>,
}

/// Domain payload, selected once when the request is created. Downstream
/// code matches on the variant instead of re-dispatching on type codes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestKind {
    Credit(CreditDossier),
    Correspondence(CorrespondenceDossier),
}

impl RequestKind {
    /// Amount used by the routing resolver. Correspondence has no monetary
    /// amount; its circuit is assigned explicitly at registration.
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Self::Credit(dossier) => Some(dossier.amount),
            Self::Correspondence(_) => None,
        }
    }
}

/// The subject under approval. `reference` is assigned once at creation by
/// the reference sequence and never changes; `state` is derived from the
/// approval ledger after submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub reference: String,
    pub workflow_type: WorkflowTypeId,
    pub circuit_id: Option<CircuitId>,
    pub requester: UserId,
    pub subject: String,
    pub description: Option<String>,
    pub kind: RequestKind,
    pub state: RequestState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
