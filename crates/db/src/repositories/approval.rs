use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use parapheur_core::domain::approval::{Approval, ApprovalId, ApprovalState};
use parapheur_core::domain::circuit::LevelId;
use parapheur_core::domain::request::{RequestId, UserId};

use super::{parse_datetime, ApprovalRepository, RepositoryError};
use crate::DbPool;

pub struct SqlApprovalRepository {
    pool: DbPool,
}

impl SqlApprovalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_state(s: &str) -> Result<ApprovalState, RepositoryError> {
    match s {
        "waiting" => Ok(ApprovalState::Waiting),
        "pending" => Ok(ApprovalState::Pending),
        "approved" => Ok(ApprovalState::Approved),
        "rejected" => Ok(ApprovalState::Rejected),
        "returned" => Ok(ApprovalState::Returned),
        "moot" => Ok(ApprovalState::Moot),
        other => Err(RepositoryError::Decode(format!("unknown approval state `{other}`"))),
    }
}

pub(crate) fn approval_state_as_str(state: ApprovalState) -> &'static str {
    match state {
        ApprovalState::Waiting => "waiting",
        ApprovalState::Pending => "pending",
        ApprovalState::Approved => "approved",
        ApprovalState::Rejected => "rejected",
        ApprovalState::Returned => "returned",
        ApprovalState::Moot => "moot",
    }
}

fn approval_from_row(row: &SqliteRow) -> Result<Approval, RepositoryError> {
    let state: String = row.try_get("state")?;
    let decided_at: Option<String> = row.try_get("decided_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Approval {
        id: ApprovalId(row.try_get("id")?),
        request_id: RequestId(row.try_get("request_id")?),
        level_id: LevelId(row.try_get("level_id")?),
        level_sequence: row.try_get("level_sequence")?,
        approver: UserId(row.try_get("approver_id")?),
        state: parse_state(&state)?,
        comment: row.try_get("comment")?,
        decided_at: decided_at.as_deref().map(parse_datetime).transpose()?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

const APPROVAL_COLUMNS: &str = "id, request_id, level_id, level_sequence, approver_id,
                                state, comment, decided_at, created_at, updated_at";

/// Ledger rows in creation order, which is level position order then
/// approver position order.
pub(crate) async fn fetch_approvals(
    conn: &mut SqliteConnection,
    request_id: &RequestId,
) -> Result<Vec<Approval>, RepositoryError> {
    let rows = sqlx::query(&format!(
        "SELECT {APPROVAL_COLUMNS} FROM request_approval WHERE request_id = ? ORDER BY created_at, id"
    ))
    .bind(&request_id.0)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(approval_from_row).collect()
}

pub(crate) async fn upsert_approval(
    conn: &mut SqliteConnection,
    approval: &Approval,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO request_approval (id, request_id, level_id, level_sequence, approver_id,
                                       state, comment, decided_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             state = excluded.state,
             comment = excluded.comment,
             decided_at = excluded.decided_at,
             updated_at = excluded.updated_at",
    )
    .bind(&approval.id.0)
    .bind(&approval.request_id.0)
    .bind(&approval.level_id.0)
    .bind(approval.level_sequence)
    .bind(&approval.approver.0)
    .bind(approval_state_as_str(approval.state))
    .bind(&approval.comment)
    .bind(approval.decided_at.map(|dt| dt.to_rfc3339()))
    .bind(approval.created_at.to_rfc3339())
    .bind(approval.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl ApprovalRepository for SqlApprovalRepository {
    async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<Approval>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM request_approval WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(approval_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Approval>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_approvals(&mut conn, request_id).await
    }

    async fn list_pending_for_approver(
        &self,
        approver: &UserId,
    ) -> Result<Vec<Approval>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM request_approval
             WHERE approver_id = ? AND state = 'pending' ORDER BY created_at"
        ))
        .bind(&approver.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(approval_from_row).collect()
    }

    async fn save(&self, approval: Approval) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_approval(&mut conn, &approval).await
    }
}
