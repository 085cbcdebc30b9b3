pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod service;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    ApprovalRepository, CircuitRepository, CommentRepository, NotificationRepository,
    RepositoryError, RequestRepository, SqlApprovalRepository, SqlCircuitRepository,
    SqlCommentRepository, SqlNotificationRepository, SqlReferenceSequence, SqlRequestRepository,
};
pub use service::{
    InboxItem, NewDocument, NewRequest, RequestDetail, ServiceError, WorkflowService,
};
