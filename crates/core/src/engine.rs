use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditOutcome};
use crate::domain::approval::{Approval, ApprovalId, ApprovalState};
use crate::domain::circuit::{Level, LevelId};
use crate::domain::comment::{Comment, CommentId, CommentKind};
use crate::domain::document::Document;
use crate::domain::request::{Request, RequestState, UserId};
use crate::errors::WorkflowError;
use crate::notify::{Notification, NotificationKind};

/// Identity of the user performing an operation. Always passed explicitly;
/// the engine never reads ambient session state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    pub id: UserId,
    pub name: String,
}

impl ActingUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: UserId(id.into()), name: name.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Approve,
    Reject,
    Return,
}

impl DecisionAction {
    fn comment_kind(self) -> CommentKind {
        match self {
            Self::Approve => CommentKind::ApprovalNote,
            Self::Reject => CommentKind::RejectionReason,
            Self::Return => CommentKind::Return,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Approve => "Validation",
            Self::Reject => "Rejet",
            Self::Return => "Retour",
        }
    }

    fn audit_action(self) -> &'static str {
        match self {
            Self::Approve => "approval.approved",
            Self::Reject => "approval.rejected",
            Self::Return => "approval.returned",
        }
    }
}

/// Everything the state machine needs about one request: the request row,
/// the active levels of its resolved circuit in `(sequence, position)`
/// order, and the full approval ledger. The store loads a case inside one
/// transaction, the engine mutates it, and the store writes it back in the
/// same transaction, so request and ledger are never updated apart.
#[derive(Clone, Debug)]
pub struct RequestCase {
    pub request: Request,
    pub levels: Vec<Level>,
    pub approvals: Vec<Approval>,
    pub documents: Vec<Document>,
    pub comment_count: u32,
}

impl RequestCase {
    fn first_sequence(&self) -> Option<i32> {
        self.levels.iter().map(|level| level.sequence).min()
    }

    /// Nearest rank strictly after `after`.
    fn next_sequence(&self, after: i32) -> Option<i32> {
        self.levels.iter().map(|level| level.sequence).filter(|seq| *seq > after).min()
    }

    /// Nearest rank strictly before `before`.
    fn previous_sequence(&self, before: i32) -> Option<i32> {
        self.levels.iter().map(|level| level.sequence).filter(|seq| *seq < before).max()
    }

    fn level_name(&self, id: &LevelId) -> String {
        self.levels
            .iter()
            .find(|level| level.id == *id)
            .map(|level| level.name.clone())
            .unwrap_or_else(|| "niveau inconnu".to_string())
    }

    fn any_pending(&self) -> bool {
        self.approvals.iter().any(|approval| approval.state == ApprovalState::Pending)
    }

    /// Pending approval for a given approver, if one exists. Used by
    /// callers resolving "decide as user X" without an approval id.
    pub fn pending_for(&self, approver: &UserId) -> Option<&Approval> {
        self.approvals
            .iter()
            .find(|a| a.approver == *approver && a.state == ApprovalState::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalChange {
    pub approval_id: ApprovalId,
    pub from: ApprovalState,
    pub to: ApprovalState,
}

#[derive(Clone, Debug)]
pub struct SubmitOutcome {
    pub request_state: RequestState,
    pub created: Vec<ApprovalId>,
    pub audit: Vec<AuditEntry>,
    pub notifications: Vec<Notification>,
}

#[derive(Clone, Debug)]
pub struct DecisionOutcome {
    pub request_state: RequestState,
    pub changed: Vec<ApprovalChange>,
    pub comment: Comment,
    pub audit: Vec<AuditEntry>,
    pub notifications: Vec<Notification>,
}

#[derive(Clone, Debug)]
pub struct CancelOutcome {
    pub request_state: RequestState,
    pub audit: Vec<AuditEntry>,
}

/// The approval state machine. Stateless; all state lives in the
/// [`RequestCase`] aggregate, and every mutation goes through the single
/// advance path in [`WorkflowEngine::decide`].
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkflowEngine;

impl WorkflowEngine {
    pub fn new() -> Self {
        Self
    }

    /// Instantiates the approval ledger and moves the request
    /// draft → submitted → in_progress.
    ///
    /// Every active level must carry at least one approver; an empty set is
    /// a configuration error, not a silent fallback assignment.
    pub fn submit(
        &self,
        case: &mut RequestCase,
        actor: &ActingUser,
    ) -> Result<SubmitOutcome, WorkflowError> {
        if case.request.state != RequestState::Draft {
            return Err(WorkflowError::InvalidState(format!(
                "request `{}` has already been submitted",
                case.request.reference
            )));
        }
        if case.request.circuit_id.is_none() {
            return Err(WorkflowError::Configuration(format!(
                "request `{}` has no resolved validation circuit",
                case.request.reference
            )));
        }
        let Some(first_sequence) = case.first_sequence() else {
            return Err(WorkflowError::Configuration(
                "the validation circuit has no active levels".to_string(),
            ));
        };
        for level in &case.levels {
            if level.approvers.is_empty() {
                return Err(WorkflowError::Configuration(format!(
                    "level `{}` has no configured approvers",
                    level.name
                )));
            }
        }

        let now = Utc::now();

        let mut created = Vec::new();
        let mut notifications = Vec::new();
        for level in &case.levels {
            let mut seen = HashSet::new();
            for approver in &level.approvers {
                if !seen.insert(approver.clone()) {
                    continue;
                }
                let state = if level.sequence == first_sequence {
                    ApprovalState::Pending
                } else {
                    ApprovalState::Waiting
                };
                let approval = Approval {
                    id: ApprovalId(Uuid::new_v4().to_string()),
                    request_id: case.request.id.clone(),
                    level_id: level.id.clone(),
                    level_sequence: level.sequence,
                    approver: approver.clone(),
                    state,
                    comment: None,
                    decided_at: None,
                    created_at: now,
                    updated_at: now,
                };
                created.push(approval.id.clone());
                if state == ApprovalState::Pending {
                    notifications.push(Notification::new(
                        Some(case.request.id.clone()),
                        approver.clone(),
                        NotificationKind::ApprovalRequest,
                        "Demande d'approbation",
                        format!("{} awaits your decision", case.request.reference),
                    ));
                }
                case.approvals.push(approval);
            }
        }

        for document in &mut case.documents {
            document.ensure_access_token();
        }

        // Submission and circulation start are one operation; the request
        // never rests in the intermediate submitted state.
        case.request.state = RequestState::InProgress;
        case.request.updated_at = now;

        let audit = vec![AuditEntry::new(
            case.request.id.clone(),
            actor.id.clone(),
            "request.submitted",
            AuditOutcome::Success,
        )
        .with_metadata("from", "draft")
        .with_metadata("to", "in_progress")
        .with_metadata("approvals_created", created.len().to_string())];

        Ok(SubmitOutcome {
            request_state: case.request.state,
            created,
            audit,
            notifications,
        })
    }

    /// Applies one approver decision and recomputes the aggregate request
    /// state. This is the only code path that advances, stalls, terminates
    /// or reopens the circuit.
    pub fn decide(
        &self,
        case: &mut RequestCase,
        approval_id: &ApprovalId,
        action: DecisionAction,
        comment_text: &str,
        actor: &ActingUser,
    ) -> Result<DecisionOutcome, WorkflowError> {
        if case.request.state != RequestState::InProgress {
            return Err(WorkflowError::InvalidState(format!(
                "request `{}` is {:?}, no decision can be recorded",
                case.request.reference, case.request.state
            )));
        }

        let index = case
            .approvals
            .iter()
            .position(|approval| approval.id == *approval_id)
            .ok_or_else(|| {
                WorkflowError::InvalidState(format!(
                    "approval `{}` does not belong to request `{}`",
                    approval_id.0, case.request.reference
                ))
            })?;

        if case.approvals[index].approver != actor.id {
            return Err(WorkflowError::NotAuthorized {
                user: actor.id.0.clone(),
                reason: format!(
                    "approval `{}` is assigned to `{}`",
                    approval_id.0, case.approvals[index].approver.0
                ),
            });
        }
        if case.approvals[index].state != ApprovalState::Pending {
            return Err(WorkflowError::InvalidState(format!(
                "approval `{}` is not pending",
                approval_id.0
            )));
        }
        let comment_text = comment_text.trim();
        if comment_text.is_empty() {
            return Err(WorkflowError::Validation(
                "a comment is required on every decision".to_string(),
            ));
        }

        let now = Utc::now();
        let sequence = case.approvals[index].level_sequence;
        let level_id = case.approvals[index].level_id.clone();
        let decided_state = match action {
            DecisionAction::Approve => ApprovalState::Approved,
            DecisionAction::Reject => ApprovalState::Rejected,
            DecisionAction::Return => ApprovalState::Returned,
        };

        let mut changed = vec![ApprovalChange {
            approval_id: approval_id.clone(),
            from: ApprovalState::Pending,
            to: decided_state,
        }];
        {
            let approval = &mut case.approvals[index];
            approval.state = decided_state;
            approval.comment = Some(comment_text.to_string());
            approval.decided_at = Some(now);
            approval.updated_at = now;
        }

        let mut notifications = Vec::new();
        let mut audit = vec![AuditEntry::new(
            case.request.id.clone(),
            actor.id.clone(),
            action.audit_action(),
            AuditOutcome::Success,
        )
        .with_metadata("level_sequence", sequence.to_string())];

        let mut returned_to_level = None;
        let next_state = match action {
            DecisionAction::Approve => {
                self.advance_after_approve(case, sequence, now, &mut changed, &mut notifications)
            }
            DecisionAction::Reject => {
                self.moot_remaining(case, now, &mut changed);
                notifications.push(Notification::new(
                    Some(case.request.id.clone()),
                    case.request.requester.clone(),
                    NotificationKind::Rejected,
                    "Demande refusée",
                    format!("{} was rejected", case.request.reference),
                ));
                RequestState::Rejected
            }
            DecisionAction::Return => {
                returned_to_level =
                    self.retreat_after_return(case, sequence, now, &mut changed, &mut notifications);
                RequestState::InProgress
            }
        };

        if !case.request.state.can_transition(next_state) {
            // Reaching this means the advance logic computed a transition
            // the lifecycle table forbids; treat as a data-integrity bug.
            return Err(WorkflowError::InvalidState(format!(
                "cannot move request `{}` from {:?} to {:?}",
                case.request.reference, case.request.state, next_state
            )));
        }
        if next_state != case.request.state {
            audit.push(
                AuditEntry::new(
                    case.request.id.clone(),
                    actor.id.clone(),
                    match next_state {
                        RequestState::Approved => "request.approved",
                        RequestState::Rejected => "request.rejected",
                        _ => "request.advanced",
                    },
                    AuditOutcome::Success,
                )
                .with_metadata("from", format!("{:?}", case.request.state))
                .with_metadata("to", format!("{next_state:?}")),
            );
        }
        case.request.state = next_state;
        case.request.updated_at = now;

        if next_state == RequestState::Approved {
            notifications.push(Notification::new(
                Some(case.request.id.clone()),
                case.request.requester.clone(),
                NotificationKind::Approved,
                "Demande approuvée",
                format!("{} was fully approved", case.request.reference),
            ));
        }

        case.comment_count += 1;
        let comment = Comment {
            id: CommentId(Uuid::new_v4().to_string()),
            request_id: case.request.id.clone(),
            approval_id: Some(approval_id.clone()),
            author: actor.id.clone(),
            kind: action.comment_kind(),
            subject: Some(format!("{} - {}", action.label(), case.level_name(&level_id))),
            message: comment_text.to_string(),
            author_level_sequence: Some(sequence),
            returned_from_level: match action {
                DecisionAction::Return => Some(sequence),
                _ => None,
            },
            returned_to_level,
            exchange_number: case.comment_count,
            created_at: now,
        };

        Ok(DecisionOutcome {
            request_state: case.request.state,
            changed,
            comment,
            audit,
            notifications,
        })
    }

    /// Cancels a draft. Only the requester may cancel, and only before
    /// submission; a circulating request must be rejected instead.
    pub fn cancel(
        &self,
        case: &mut RequestCase,
        actor: &ActingUser,
    ) -> Result<CancelOutcome, WorkflowError> {
        if actor.id != case.request.requester {
            return Err(WorkflowError::NotAuthorized {
                user: actor.id.0.clone(),
                reason: format!(
                    "request `{}` belongs to `{}`",
                    case.request.reference, case.request.requester.0
                ),
            });
        }
        if !case.request.state.can_transition(RequestState::Cancelled) {
            return Err(WorkflowError::InvalidState(format!(
                "request `{}` is {:?} and can no longer be cancelled",
                case.request.reference, case.request.state
            )));
        }

        case.request.state = RequestState::Cancelled;
        case.request.updated_at = Utc::now();

        Ok(CancelOutcome {
            request_state: case.request.state,
            audit: vec![AuditEntry::new(
                case.request.id.clone(),
                actor.id.clone(),
                "request.cancelled",
                AuditOutcome::Success,
            )],
        })
    }

    /// AND-join then advance: the circuit moves past a rank only once every
    /// approver at that rank has approved.
    fn advance_after_approve(
        &self,
        case: &mut RequestCase,
        sequence: i32,
        now: chrono::DateTime<Utc>,
        changed: &mut Vec<ApprovalChange>,
        notifications: &mut Vec<Notification>,
    ) -> RequestState {
        let peers_pending = case
            .approvals
            .iter()
            .any(|a| a.level_sequence == sequence && a.state == ApprovalState::Pending);
        if peers_pending {
            return RequestState::InProgress;
        }

        let Some(next_sequence) = case.next_sequence(sequence) else {
            return RequestState::Approved;
        };

        let request_id = case.request.id.clone();
        let reference = case.request.reference.clone();
        let mut rank_open = false;
        for approval in
            case.approvals.iter_mut().filter(|a| a.level_sequence == next_sequence)
        {
            match approval.state {
                ApprovalState::Waiting | ApprovalState::Returned => {
                    changed.push(ApprovalChange {
                        approval_id: approval.id.clone(),
                        from: approval.state,
                        to: ApprovalState::Pending,
                    });
                    approval.state = ApprovalState::Pending;
                    approval.updated_at = now;
                    notifications.push(Notification::new(
                        Some(request_id.clone()),
                        approval.approver.clone(),
                        NotificationKind::ApprovalRequest,
                        "Demande d'approbation",
                        format!("{reference} awaits your decision"),
                    ));
                    rank_open = true;
                }
                ApprovalState::Pending => rank_open = true,
                _ => {}
            }
        }

        if rank_open {
            RequestState::InProgress
        } else if case.any_pending() {
            // Next rank is unexpectedly fully decided; fall back to a full
            // ledger scan before declaring the request finished.
            RequestState::InProgress
        } else {
            RequestState::Approved
        }
    }

    /// A rejection terminates the whole circuit. Remaining pending and
    /// waiting rows are marked moot so no open assignment dangles on a
    /// closed request.
    fn moot_remaining(
        &self,
        case: &mut RequestCase,
        now: chrono::DateTime<Utc>,
        changed: &mut Vec<ApprovalChange>,
    ) {
        for approval in case.approvals.iter_mut().filter(|a| {
            matches!(a.state, ApprovalState::Pending | ApprovalState::Waiting)
        }) {
            changed.push(ApprovalChange {
                approval_id: approval.id.clone(),
                from: approval.state,
                to: ApprovalState::Moot,
            });
            approval.state = ApprovalState::Moot;
            approval.updated_at = now;
        }
    }

    /// Return: re-activate the nearest previous rank and park still-pending
    /// peers of the returning rank back to waiting, so the single open rank
    /// invariant holds while the earlier level re-decides. Returns the rank
    /// the request retreated to, if any.
    fn retreat_after_return(
        &self,
        case: &mut RequestCase,
        sequence: i32,
        now: chrono::DateTime<Utc>,
        changed: &mut Vec<ApprovalChange>,
        notifications: &mut Vec<Notification>,
    ) -> Option<i32> {
        let previous_sequence = case.previous_sequence(sequence)?;

        for approval in case
            .approvals
            .iter_mut()
            .filter(|a| a.level_sequence == sequence && a.state == ApprovalState::Pending)
        {
            changed.push(ApprovalChange {
                approval_id: approval.id.clone(),
                from: approval.state,
                to: ApprovalState::Waiting,
            });
            approval.state = ApprovalState::Waiting;
            approval.updated_at = now;
        }

        let request_id = case.request.id.clone();
        let reference = case.request.reference.clone();
        for approval in case
            .approvals
            .iter_mut()
            .filter(|a| a.level_sequence == previous_sequence && a.state != ApprovalState::Pending)
        {
            changed.push(ApprovalChange {
                approval_id: approval.id.clone(),
                from: approval.state,
                to: ApprovalState::Pending,
            });
            approval.state = ApprovalState::Pending;
            approval.updated_at = now;
            notifications.push(Notification::new(
                Some(request_id.clone()),
                approval.approver.clone(),
                NotificationKind::ApprovalRequest,
                "Demande retournée",
                format!("{reference} was returned to your level for revision"),
            ));
        }

        Some(previous_sequence)
    }
}
