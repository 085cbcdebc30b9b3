pub mod audit;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod notify;
pub mod routing;
pub mod sequence;

pub use audit::{AuditEntry, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::approval::{Approval, ApprovalId, ApprovalState};
pub use domain::circuit::{CircuitDefinition, CircuitId, Level, LevelId};
pub use domain::comment::{Comment, CommentId, CommentKind};
pub use domain::document::{Document, DocumentId};
pub use domain::request::{
    CorrespondenceDossier, CreditDossier, CreditKind, MailKind, Priority, Request, RequestId,
    RequestKind, RequestState, UserId,
};
pub use domain::workflow_type::{WorkflowType, WorkflowTypeId};
pub use engine::{
    ActingUser, ApprovalChange, CancelOutcome, DecisionAction, DecisionOutcome, RequestCase,
    SubmitOutcome, WorkflowEngine,
};
pub use errors::WorkflowError;
pub use notify::{InMemoryNotifier, NoopNotifier, Notification, NotificationKind, Notifier};
pub use routing::{CircuitRouter, RoutingRule, RoutingRuleId};
pub use sequence::{format_reference, InMemorySequence, ReferenceSequence, SequenceError};
