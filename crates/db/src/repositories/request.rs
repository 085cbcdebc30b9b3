use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use parapheur_core::domain::circuit::CircuitId;
use parapheur_core::domain::document::{Document, DocumentId};
use parapheur_core::domain::request::{Request, RequestId, RequestKind, RequestState, UserId};
use parapheur_core::domain::workflow_type::WorkflowTypeId;

use super::{parse_datetime, RepositoryError, RequestRepository};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_state(s: &str) -> Result<RequestState, RepositoryError> {
    match s {
        "draft" => Ok(RequestState::Draft),
        "submitted" => Ok(RequestState::Submitted),
        "in_progress" => Ok(RequestState::InProgress),
        "approved" => Ok(RequestState::Approved),
        "rejected" => Ok(RequestState::Rejected),
        "cancelled" => Ok(RequestState::Cancelled),
        other => Err(RepositoryError::Decode(format!("unknown request state `{other}`"))),
    }
}

pub(crate) fn request_state_as_str(state: RequestState) -> &'static str {
    match state {
        RequestState::Draft => "draft",
        RequestState::Submitted => "submitted",
        RequestState::InProgress => "in_progress",
        RequestState::Approved => "approved",
        RequestState::Rejected => "rejected",
        RequestState::Cancelled => "cancelled",
    }
}

fn request_from_row(row: &SqliteRow) -> Result<Request, RepositoryError> {
    let kind_json: String = row.try_get("kind")?;
    let kind: RequestKind = serde_json::from_str(&kind_json)
        .map_err(|e| RepositoryError::Decode(format!("bad request payload: {e}")))?;
    let state: String = row.try_get("state")?;
    let circuit_id: Option<String> = row.try_get("circuit_id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Request {
        id: RequestId(row.try_get("id")?),
        reference: row.try_get("reference")?,
        workflow_type: WorkflowTypeId(row.try_get("workflow_type_id")?),
        circuit_id: circuit_id.map(CircuitId),
        requester: UserId(row.try_get("requester_id")?),
        subject: row.try_get("subject")?,
        description: row.try_get("description")?,
        kind,
        state: parse_state(&state)?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

fn document_from_row(row: &SqliteRow) -> Result<Document, RepositoryError> {
    let created_at: String = row.try_get("created_at")?;
    let size_bytes: Option<i64> = row.try_get("size_bytes")?;
    Ok(Document {
        id: DocumentId(row.try_get("id")?),
        request_id: RequestId(row.try_get("request_id")?),
        name: row.try_get("name")?,
        mime_type: row.try_get("mime_type")?,
        size_bytes: size_bytes.map(|s| s as u64),
        access_token: row.try_get("access_token")?,
        created_at: parse_datetime(&created_at)?,
    })
}

const REQUEST_COLUMNS: &str = "id, reference, workflow_type_id, circuit_id, requester_id,
                               subject, description, kind, state, created_at, updated_at";

pub(crate) async fn fetch_request(
    conn: &mut SqliteConnection,
    id: &RequestId,
) -> Result<Option<Request>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM workflow_request WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(ref row) => Ok(Some(request_from_row(row)?)),
        None => Ok(None),
    }
}

/// Rewrites the request row without changing it, taking SQLite's write lock
/// for the rest of the transaction. Concurrent deciders serialize here.
pub(crate) async fn touch_request(
    conn: &mut SqliteConnection,
    id: &RequestId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("UPDATE workflow_request SET updated_at = updated_at WHERE id = ?")
        .bind(&id.0)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn upsert_request(
    conn: &mut SqliteConnection,
    request: &Request,
) -> Result<(), RepositoryError> {
    let kind_json = serde_json::to_string(&request.kind)
        .map_err(|e| RepositoryError::Decode(format!("bad request payload: {e}")))?;

    sqlx::query(
        "INSERT INTO workflow_request (id, reference, workflow_type_id, circuit_id, requester_id,
                                       subject, description, kind, state, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             reference = excluded.reference,
             workflow_type_id = excluded.workflow_type_id,
             circuit_id = excluded.circuit_id,
             requester_id = excluded.requester_id,
             subject = excluded.subject,
             description = excluded.description,
             kind = excluded.kind,
             state = excluded.state,
             updated_at = excluded.updated_at",
    )
    .bind(&request.id.0)
    .bind(&request.reference)
    .bind(&request.workflow_type.0)
    .bind(request.circuit_id.as_ref().map(|c| c.0.clone()))
    .bind(&request.requester.0)
    .bind(&request.subject)
    .bind(&request.description)
    .bind(kind_json)
    .bind(request_state_as_str(request.state))
    .bind(request.created_at.to_rfc3339())
    .bind(request.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn fetch_documents(
    conn: &mut SqliteConnection,
    request_id: &RequestId,
) -> Result<Vec<Document>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT id, request_id, name, mime_type, size_bytes, access_token, created_at
         FROM request_document WHERE request_id = ? ORDER BY created_at",
    )
    .bind(&request_id.0)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(document_from_row).collect()
}

pub(crate) async fn upsert_document(
    conn: &mut SqliteConnection,
    document: &Document,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO request_document (id, request_id, name, mime_type, size_bytes,
                                       access_token, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             mime_type = excluded.mime_type,
             size_bytes = excluded.size_bytes,
             access_token = excluded.access_token",
    )
    .bind(&document.id.0)
    .bind(&document.request_id.0)
    .bind(&document.name)
    .bind(&document.mime_type)
    .bind(document.size_bytes.map(|s| s as i64))
    .bind(&document.access_token)
    .bind(document.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_request(&mut conn, id).await
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM workflow_request WHERE reference = ?"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(request_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, request: Request) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_request(&mut conn, &request).await
    }

    async fn list_documents(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Document>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_documents(&mut conn, request_id).await
    }

    async fn save_document(&self, document: Document) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_document(&mut conn, &document).await
    }
}
