use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::RequestId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

/// A binary attachment on a request. Approvers view attachments through an
/// access token minted at submission, so they need no extra storage rights.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub request_id: RequestId,
    pub name: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub access_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Mints an access token if the document has none yet. Returns whether
    /// a new token was issued.
    pub fn ensure_access_token(&mut self) -> bool {
        if self.access_token.is_some() {
            return false;
        }
        self.access_token = Some(Uuid::new_v4().to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Document, DocumentId};
    use crate::domain::request::RequestId;

    #[test]
    fn access_token_is_minted_once() {
        let mut document = Document {
            id: DocumentId("doc-1".to_string()),
            request_id: RequestId("req-1".to_string()),
            name: "contract.pdf".to_string(),
            mime_type: Some("application/pdf".to_string()),
            size_bytes: Some(120_000),
            access_token: None,
            created_at: Utc::now(),
        };

        assert!(document.ensure_access_token());
        let token = document.access_token.clone();
        assert!(token.is_some());

        assert!(!document.ensure_access_token());
        assert_eq!(document.access_token, token);
    }
}
