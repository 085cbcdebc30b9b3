use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use parapheur_core::audit::{AuditEntry, AuditOutcome};
use parapheur_core::domain::approval::ApprovalId;
use parapheur_core::domain::comment::{Comment, CommentId, CommentKind};
use parapheur_core::domain::request::{RequestId, UserId};

use super::{parse_datetime, CommentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCommentRepository {
    pool: DbPool,
}

impl SqlCommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_kind(s: &str) -> Result<CommentKind, RepositoryError> {
    match s {
        "approval_note" => Ok(CommentKind::ApprovalNote),
        "rejection_reason" => Ok(CommentKind::RejectionReason),
        "return" => Ok(CommentKind::Return),
        "clarification" => Ok(CommentKind::Clarification),
        "response" => Ok(CommentKind::Response),
        "information" => Ok(CommentKind::Information),
        other => Err(RepositoryError::Decode(format!("unknown comment kind `{other}`"))),
    }
}

pub(crate) fn comment_kind_as_str(kind: CommentKind) -> &'static str {
    match kind {
        CommentKind::ApprovalNote => "approval_note",
        CommentKind::RejectionReason => "rejection_reason",
        CommentKind::Return => "return",
        CommentKind::Clarification => "clarification",
        CommentKind::Response => "response",
        CommentKind::Information => "information",
    }
}

fn parse_outcome(s: &str) -> Result<AuditOutcome, RepositoryError> {
    match s {
        "success" => Ok(AuditOutcome::Success),
        "rejected" => Ok(AuditOutcome::Rejected),
        "failed" => Ok(AuditOutcome::Failed),
        other => Err(RepositoryError::Decode(format!("unknown audit outcome `{other}`"))),
    }
}

fn outcome_as_str(outcome: AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Success => "success",
        AuditOutcome::Rejected => "rejected",
        AuditOutcome::Failed => "failed",
    }
}

pub(crate) fn comment_from_row(row: &SqliteRow) -> Result<Comment, RepositoryError> {
    let kind: String = row.try_get("kind")?;
    let approval_id: Option<String> = row.try_get("approval_id")?;
    let created_at: String = row.try_get("created_at")?;
    let exchange_number: i64 = row.try_get("exchange_number")?;

    Ok(Comment {
        id: CommentId(row.try_get("id")?),
        request_id: RequestId(row.try_get("request_id")?),
        approval_id: approval_id.map(ApprovalId),
        author: UserId(row.try_get("author_id")?),
        kind: parse_kind(&kind)?,
        subject: row.try_get("subject")?,
        message: row.try_get("message")?,
        author_level_sequence: row.try_get("author_level_sequence")?,
        returned_from_level: row.try_get("returned_from_level")?,
        returned_to_level: row.try_get("returned_to_level")?,
        exchange_number: exchange_number as u32,
        created_at: parse_datetime(&created_at)?,
    })
}

fn audit_from_row(row: &SqliteRow) -> Result<AuditEntry, RepositoryError> {
    let outcome: String = row.try_get("outcome")?;
    let metadata_json: String = row.try_get("metadata")?;
    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)
        .map_err(|e| RepositoryError::Decode(format!("bad audit metadata: {e}")))?;
    let occurred_at: String = row.try_get("occurred_at")?;

    Ok(AuditEntry {
        entry_id: row.try_get("entry_id")?,
        request_id: RequestId(row.try_get("request_id")?),
        actor: UserId(row.try_get("actor_id")?),
        action: row.try_get("action")?,
        outcome: parse_outcome(&outcome)?,
        metadata,
        occurred_at: parse_datetime(&occurred_at)?,
    })
}

pub(crate) async fn count_comments(
    conn: &mut SqliteConnection,
    request_id: &RequestId,
) -> Result<u32, RepositoryError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM request_comment WHERE request_id = ?")
            .bind(&request_id.0)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count as u32)
}

pub(crate) async fn insert_comment(
    conn: &mut SqliteConnection,
    comment: &Comment,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO request_comment (id, request_id, approval_id, author_id, kind, subject,
                                      message, author_level_sequence, returned_from_level,
                                      returned_to_level, exchange_number, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&comment.id.0)
    .bind(&comment.request_id.0)
    .bind(comment.approval_id.as_ref().map(|a| a.0.clone()))
    .bind(&comment.author.0)
    .bind(comment_kind_as_str(comment.kind))
    .bind(&comment.subject)
    .bind(&comment.message)
    .bind(comment.author_level_sequence)
    .bind(comment.returned_from_level)
    .bind(comment.returned_to_level)
    .bind(comment.exchange_number as i64)
    .bind(comment.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_audit_entry(
    conn: &mut SqliteConnection,
    entry: &AuditEntry,
) -> Result<(), RepositoryError> {
    let metadata_json = serde_json::to_string(&entry.metadata)
        .map_err(|e| RepositoryError::Decode(format!("bad audit metadata: {e}")))?;

    sqlx::query(
        "INSERT INTO audit_log (entry_id, request_id, actor_id, action, outcome, metadata, occurred_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.entry_id)
    .bind(&entry.request_id.0)
    .bind(&entry.actor.0)
    .bind(&entry.action)
    .bind(outcome_as_str(entry.outcome))
    .bind(metadata_json)
    .bind(entry.occurred_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl CommentRepository for SqlCommentRepository {
    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Comment>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, request_id, approval_id, author_id, kind, subject, message,
                    author_level_sequence, returned_from_level, returned_to_level,
                    exchange_number, created_at
             FROM request_comment WHERE request_id = ? ORDER BY exchange_number",
        )
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(comment_from_row).collect()
    }

    async fn count_for_request(&self, request_id: &RequestId) -> Result<u32, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        count_comments(&mut conn, request_id).await
    }

    async fn append(&self, comment: Comment) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_comment(&mut conn, &comment).await
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_audit_entry(&mut conn, &entry).await
    }

    async fn list_audit_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<AuditEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT entry_id, request_id, actor_id, action, outcome, metadata, occurred_at
             FROM audit_log WHERE request_id = ? ORDER BY occurred_at, entry_id",
        )
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(audit_from_row).collect()
    }
}
