use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::{RequestId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Warning,
    ApprovalRequest,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub request_id: Option<RequestId>,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub subject: String,
    pub message: String,
    pub read: bool,
    pub sent_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        request_id: Option<RequestId>,
        recipient: UserId,
        kind: NotificationKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_id,
            recipient,
            kind,
            subject: subject.into(),
            message: message.into(),
            read: false,
            sent_at: Utc::now(),
        }
    }
}

/// Fire-and-forget delivery to a user. Best effort: delivery failures must
/// never block or roll back a state transition.
pub trait Notifier: Send + Sync {
    fn deliver(&self, notification: Notification);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn deliver(&self, _notification: Notification) {}
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for InMemoryNotifier {
    fn deliver(&self, notification: Notification) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryNotifier, Notification, NotificationKind, Notifier};
    use crate::domain::request::{RequestId, UserId};

    #[test]
    fn in_memory_notifier_captures_deliveries() {
        let notifier = InMemoryNotifier::default();
        notifier.deliver(Notification::new(
            Some(RequestId("req-1".to_string())),
            UserId("u-chief".to_string()),
            NotificationKind::ApprovalRequest,
            "Approval requested",
            "CRD/2026/0001 awaits your decision",
        ));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::ApprovalRequest);
        assert!(!sent[0].read);
    }
}
