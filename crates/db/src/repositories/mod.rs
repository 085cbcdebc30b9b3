use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use parapheur_core::audit::AuditEntry;
use parapheur_core::domain::approval::{Approval, ApprovalId};
use parapheur_core::domain::circuit::{CircuitDefinition, CircuitId};
use parapheur_core::domain::comment::Comment;
use parapheur_core::domain::document::Document;
use parapheur_core::domain::request::{Request, RequestId, UserId};
use parapheur_core::domain::workflow_type::{WorkflowType, WorkflowTypeId};
use parapheur_core::notify::Notification;
use parapheur_core::routing::RoutingRule;

pub mod approval;
pub mod circuit;
pub mod comment;
pub mod notification;
pub mod request;
pub mod sequence;

pub use approval::SqlApprovalRepository;
pub use circuit::SqlCircuitRepository;
pub use comment::SqlCommentRepository;
pub use notification::SqlNotificationRepository;
pub use request::SqlRequestRepository;
pub use sequence::SqlReferenceSequence;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

pub(crate) fn parse_datetime(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{value}`: {e}")))
}

#[async_trait]
pub trait CircuitRepository: Send + Sync {
    async fn find_workflow_type_by_code(
        &self,
        code: &str,
    ) -> Result<Option<WorkflowType>, RepositoryError>;
    async fn save_workflow_type(&self, workflow_type: WorkflowType)
        -> Result<(), RepositoryError>;
    async fn find_circuit_by_id(
        &self,
        id: &CircuitId,
    ) -> Result<Option<CircuitDefinition>, RepositoryError>;
    async fn save_circuit(&self, circuit: CircuitDefinition) -> Result<(), RepositoryError>;
    async fn list_routing_rules(
        &self,
        workflow_type: &WorkflowTypeId,
    ) -> Result<Vec<RoutingRule>, RepositoryError>;
    async fn save_routing_rule(&self, rule: RoutingRule) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError>;
    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Request>, RepositoryError>;
    async fn save(&self, request: Request) -> Result<(), RepositoryError>;
    async fn list_documents(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Document>, RepositoryError>;
    async fn save_document(&self, document: Document) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<Approval>, RepositoryError>;
    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Approval>, RepositoryError>;
    async fn list_pending_for_approver(
        &self,
        approver: &UserId,
    ) -> Result<Vec<Approval>, RepositoryError>;
    async fn save(&self, approval: Approval) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Comment>, RepositoryError>;
    async fn count_for_request(&self, request_id: &RequestId) -> Result<u32, RepositoryError>;
    async fn append(&self, comment: Comment) -> Result<(), RepositoryError>;
    async fn append_audit(&self, entry: AuditEntry) -> Result<(), RepositoryError>;
    async fn list_audit_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<AuditEntry>, RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn save(&self, notification: Notification) -> Result<(), RepositoryError>;
    async fn inbox_for(
        &self,
        recipient: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError>;
    async fn mark_read(&self, id: &str) -> Result<(), RepositoryError>;
}
