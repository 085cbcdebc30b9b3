use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::{RequestId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

/// One append-only audit record per state change. The state machine emits
/// these synchronously with every transition so they are persisted in the
/// same transaction as the change itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub request_id: RequestId,
    pub actor: UserId,
    pub action: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        request_id: RequestId,
        actor: UserId,
        action: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            request_id,
            actor,
            action: action.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditEntry);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryAuditSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn append(&self, entry: AuditEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditEntry, AuditOutcome, AuditSink, InMemoryAuditSink};
    use crate::domain::request::{RequestId, UserId};

    #[test]
    fn in_memory_sink_records_entries_in_order() {
        let sink = InMemoryAuditSink::default();
        sink.append(
            AuditEntry::new(
                RequestId("req-1".to_string()),
                UserId("u-agent".to_string()),
                "request.submitted",
                AuditOutcome::Success,
            )
            .with_metadata("from", "draft")
            .with_metadata("to", "in_progress"),
        );
        sink.append(AuditEntry::new(
            RequestId("req-1".to_string()),
            UserId("u-chief".to_string()),
            "approval.approved",
            AuditOutcome::Success,
        ));

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "request.submitted");
        assert_eq!(entries[0].metadata.get("to").map(String::as_str), Some("in_progress"));
        assert_eq!(entries[1].actor, UserId("u-chief".to_string()));
    }
}
