use std::sync::Arc;

use chrono::Utc;
use sqlx::SqliteConnection;
use thiserror::Error;
use uuid::Uuid;

use parapheur_core::domain::approval::{Approval, ApprovalId};
use parapheur_core::domain::circuit::CircuitId;
use parapheur_core::domain::comment::Comment;
use parapheur_core::domain::document::{Document, DocumentId};
use parapheur_core::domain::request::{Request, RequestId, RequestKind, RequestState, UserId};
use parapheur_core::engine::{
    ActingUser, DecisionAction, DecisionOutcome, RequestCase, SubmitOutcome, WorkflowEngine,
};
use parapheur_core::errors::WorkflowError;
use parapheur_core::notify::{NoopNotifier, Notification, Notifier};
use parapheur_core::routing::CircuitRouter;
use parapheur_core::sequence::{ReferenceSequence, SequenceError};

use crate::repositories::{
    approval as approval_repo, circuit as circuit_repo, comment as comment_repo,
    notification as notification_repo, request as request_repo, RepositoryError,
    SqlReferenceSequence,
};
use crate::DbPool;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("request `{0}` was not found")]
    RequestNotFound(String),
    #[error("approval `{0}` was not found")]
    ApprovalNotFound(String),
    #[error("no pending approval for user `{0}` on this request")]
    NothingPending(String),
}

/// Input for registering a new request. The circuit may be forced
/// explicitly (correspondence registration does this); otherwise it is
/// resolved from the routing rules of the workflow type.
#[derive(Clone, Debug)]
pub struct NewRequest {
    pub workflow_type_code: String,
    pub requester: UserId,
    pub subject: String,
    pub description: Option<String>,
    pub kind: RequestKind,
    pub circuit: Option<CircuitId>,
    pub documents: Vec<NewDocument>,
}

#[derive(Clone, Debug)]
pub struct NewDocument {
    pub name: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct InboxItem {
    pub approval: Approval,
    pub reference: String,
    pub subject: String,
    pub state: RequestState,
}

#[derive(Clone, Debug)]
pub struct RequestDetail {
    pub request: Request,
    pub approvals: Vec<Approval>,
    pub comments: Vec<Comment>,
    pub documents: Vec<Document>,
}

/// Orchestrates the approval state machine over the database. Every
/// operation loads the full request aggregate, runs the pure engine and
/// writes the result back inside one transaction; notifications go out
/// after commit, best effort.
pub struct WorkflowService {
    pool: DbPool,
    engine: WorkflowEngine,
    sequence: SqlReferenceSequence,
    notifier: Arc<dyn Notifier>,
    reference_fallback: String,
}

impl WorkflowService {
    pub fn new(pool: DbPool) -> Self {
        Self::with_notifier(pool, Arc::new(NoopNotifier))
    }

    pub fn with_notifier(pool: DbPool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            sequence: SqlReferenceSequence::new(pool.clone()),
            pool,
            engine: WorkflowEngine::new(),
            notifier,
            reference_fallback: "REQ".to_string(),
        }
    }

    /// Reference code used when a workflow type carries a blank code.
    pub fn with_reference_fallback(mut self, code: impl Into<String>) -> Self {
        self.reference_fallback = code.into();
        self
    }

    /// Registers a draft: assigns the reference, resolves the circuit and
    /// stores the request with its attachments.
    pub async fn create_request(&self, input: NewRequest) -> Result<Request, ServiceError> {
        // Lookups and the sequence draw each take a pool connection in
        // turn; at no point does registration hold two at once. A number
        // drawn here is burnt if the insert below fails.
        let (workflow_type, circuit_id) = {
            let mut conn = self.pool.acquire().await?;
            let workflow_type =
                circuit_repo::fetch_workflow_type_by_code(&mut *conn, &input.workflow_type_code)
                    .await?
                    .filter(|wt| wt.active)
                    .ok_or_else(|| {
                        WorkflowError::Configuration(format!(
                            "no active workflow type with code `{}`",
                            input.workflow_type_code
                        ))
                    })?;

            let circuit_id = match (&input.circuit, input.kind.amount()) {
                (Some(circuit), _) => {
                    circuit_repo::fetch_circuit(&mut *conn, circuit)
                        .await?
                        .filter(|c| c.active)
                        .ok_or_else(|| {
                            WorkflowError::Configuration(format!(
                                "circuit `{}` does not exist or is inactive",
                                circuit.0
                            ))
                        })?;
                    Some(circuit.clone())
                }
                (None, Some(amount)) => {
                    let rules =
                        circuit_repo::fetch_routing_rules(&mut *conn, &workflow_type.id).await?;
                    CircuitRouter::new(rules).resolve(&workflow_type.id, amount).cloned()
                }
                (None, None) => None,
            };
            (workflow_type, circuit_id)
        };

        let reference_code = match workflow_type.code.trim() {
            "" => self.reference_fallback.as_str(),
            code => code,
        };
        let reference = self.sequence.next_reference(reference_code).await?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let request = Request {
            id: RequestId(Uuid::new_v4().to_string()),
            reference,
            workflow_type: workflow_type.id.clone(),
            circuit_id,
            requester: input.requester.clone(),
            subject: input.subject,
            description: input.description,
            kind: input.kind,
            state: RequestState::Draft,
            created_at: now,
            updated_at: now,
        };
        request_repo::upsert_request(&mut *tx, &request).await?;

        for document in input.documents {
            let document = Document {
                id: DocumentId(Uuid::new_v4().to_string()),
                request_id: request.id.clone(),
                name: document.name,
                mime_type: document.mime_type,
                size_bytes: document.size_bytes,
                access_token: None,
                created_at: now,
            };
            request_repo::upsert_document(&mut *tx, &document).await?;
        }

        tx.commit().await?;
        tracing::info!(reference = %request.reference, circuit = ?request.circuit_id, "request registered");
        Ok(request)
    }

    /// Submits a draft into its validation circuit.
    pub async fn submit(
        &self,
        request_id: &RequestId,
        actor: &ActingUser,
    ) -> Result<SubmitOutcome, ServiceError> {
        let mut tx = self.pool.begin().await?;
        if !request_repo::touch_request(&mut *tx, request_id).await? {
            return Err(ServiceError::RequestNotFound(request_id.0.clone()));
        }

        let mut case = load_case(&mut *tx, request_id).await?;
        let outcome = self.engine.submit(&mut case, actor)?;

        request_repo::upsert_request(&mut *tx, &case.request).await?;
        for approval in &case.approvals {
            approval_repo::upsert_approval(&mut *tx, approval).await?;
        }
        for document in &case.documents {
            request_repo::upsert_document(&mut *tx, document).await?;
        }
        for entry in &outcome.audit {
            comment_repo::insert_audit_entry(&mut *tx, entry).await?;
        }
        tx.commit().await?;

        tracing::info!(
            reference = %case.request.reference,
            approvals = outcome.created.len(),
            "request submitted",
        );
        self.dispatch(outcome.notifications.clone()).await;
        Ok(outcome)
    }

    /// Records one approver decision. When `approval_id` is absent the
    /// actor's pending approval on the request is used.
    pub async fn decide(
        &self,
        request_id: &RequestId,
        approval_id: Option<&ApprovalId>,
        action: DecisionAction,
        comment: &str,
        actor: &ActingUser,
    ) -> Result<DecisionOutcome, ServiceError> {
        let mut tx = self.pool.begin().await?;
        if !request_repo::touch_request(&mut *tx, request_id).await? {
            return Err(ServiceError::RequestNotFound(request_id.0.clone()));
        }

        let mut case = load_case(&mut *tx, request_id).await?;
        let approval_id = match approval_id {
            Some(id) => id.clone(),
            None => case
                .pending_for(&actor.id)
                .map(|approval| approval.id.clone())
                .ok_or_else(|| ServiceError::NothingPending(actor.id.0.clone()))?,
        };

        let outcome = self.engine.decide(&mut case, &approval_id, action, comment, actor)?;

        request_repo::upsert_request(&mut *tx, &case.request).await?;
        for change in &outcome.changed {
            let approval = case
                .approvals
                .iter()
                .find(|a| a.id == change.approval_id)
                .ok_or_else(|| ServiceError::ApprovalNotFound(change.approval_id.0.clone()))?;
            approval_repo::upsert_approval(&mut *tx, approval).await?;
        }
        comment_repo::insert_comment(&mut *tx, &outcome.comment).await?;
        for entry in &outcome.audit {
            comment_repo::insert_audit_entry(&mut *tx, entry).await?;
        }
        tx.commit().await?;

        tracing::info!(
            reference = %case.request.reference,
            action = ?action,
            state = ?outcome.request_state,
            "decision recorded",
        );
        self.dispatch(outcome.notifications.clone()).await;
        Ok(outcome)
    }

    /// Cancels a draft before submission.
    pub async fn cancel(
        &self,
        request_id: &RequestId,
        actor: &ActingUser,
    ) -> Result<RequestState, ServiceError> {
        let mut tx = self.pool.begin().await?;
        if !request_repo::touch_request(&mut *tx, request_id).await? {
            return Err(ServiceError::RequestNotFound(request_id.0.clone()));
        }

        let mut case = load_case(&mut *tx, request_id).await?;
        let outcome = self.engine.cancel(&mut case, actor)?;

        request_repo::upsert_request(&mut *tx, &case.request).await?;
        for entry in &outcome.audit {
            comment_repo::insert_audit_entry(&mut *tx, entry).await?;
        }
        tx.commit().await?;

        tracing::info!(reference = %case.request.reference, "request cancelled");
        Ok(outcome.request_state)
    }

    /// Pending approvals assigned to a user, joined with their requests.
    pub async fn inbox(&self, user: &UserId) -> Result<Vec<InboxItem>, ServiceError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT a.id, r.id, r.reference, r.subject
             FROM request_approval a JOIN workflow_request r ON r.id = a.request_id
             WHERE a.approver_id = ? AND a.state = 'pending'
             ORDER BY a.created_at",
        )
        .bind(&user.0)
        .fetch_all(&mut *conn)
        .await
        .map_err(RepositoryError::from)?;

        let mut items = Vec::with_capacity(rows.len());
        for (approval_id, request_id, reference, subject) in rows {
            let approvals =
                approval_repo::fetch_approvals(&mut *conn, &RequestId(request_id.clone())).await?;
            let approval = approvals
                .into_iter()
                .find(|a| a.id.0 == approval_id)
                .ok_or_else(|| ServiceError::ApprovalNotFound(approval_id.clone()))?;
            let request = request_repo::fetch_request(&mut *conn, &RequestId(request_id.clone()))
                .await?
                .ok_or_else(|| ServiceError::RequestNotFound(request_id))?;
            items.push(InboxItem { approval, reference, subject, state: request.state });
        }
        Ok(items)
    }

    /// Full view of one request: ledger, comment thread, attachments.
    pub async fn show(&self, request_id: &RequestId) -> Result<RequestDetail, ServiceError> {
        let mut conn = self.pool.acquire().await?;
        let request = request_repo::fetch_request(&mut *conn, request_id)
            .await?
            .ok_or_else(|| ServiceError::RequestNotFound(request_id.0.clone()))?;
        let approvals = approval_repo::fetch_approvals(&mut *conn, request_id).await?;
        let documents = request_repo::fetch_documents(&mut *conn, request_id).await?;

        let comment_rows = sqlx::query(
            "SELECT id, request_id, approval_id, author_id, kind, subject, message,
                    author_level_sequence, returned_from_level, returned_to_level,
                    exchange_number, created_at
             FROM request_comment WHERE request_id = ? ORDER BY exchange_number",
        )
        .bind(&request_id.0)
        .fetch_all(&mut *conn)
        .await
        .map_err(RepositoryError::from)?;
        let comments = comment_rows
            .iter()
            .map(comment_repo::comment_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RequestDetail { request, approvals, comments, documents })
    }

    /// Stores and delivers notifications after the transaction committed.
    /// Failures are logged, never propagated; the state change stands.
    async fn dispatch(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            let persisted = match self.pool.acquire().await {
                Ok(mut conn) => {
                    notification_repo::insert_notification(&mut *conn, &notification).await
                }
                Err(error) => Err(error.into()),
            };
            if let Err(error) = persisted {
                tracing::warn!(%error, recipient = %notification.recipient.0, "failed to store notification");
            }
            self.notifier.deliver(notification);
        }
    }
}

/// Loads the request aggregate the engine operates on. Callers hold the
/// write lock on the request row already.
async fn load_case(
    conn: &mut SqliteConnection,
    request_id: &RequestId,
) -> Result<RequestCase, ServiceError> {
    let request = request_repo::fetch_request(conn, request_id)
        .await?
        .ok_or_else(|| ServiceError::RequestNotFound(request_id.0.clone()))?;

    let levels = match &request.circuit_id {
        Some(circuit_id) => circuit_repo::fetch_circuit(conn, circuit_id)
            .await?
            .map(|circuit| circuit.active_levels())
            .unwrap_or_default(),
        None => Vec::new(),
    };
    let approvals = approval_repo::fetch_approvals(conn, request_id).await?;
    let documents = request_repo::fetch_documents(conn, request_id).await?;
    let comment_count = comment_repo::count_comments(conn, request_id).await?;

    Ok(RequestCase { request, levels, approvals, documents, comment_count })
}
