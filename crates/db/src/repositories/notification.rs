use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use parapheur_core::domain::request::{RequestId, UserId};
use parapheur_core::notify::{Notification, NotificationKind};

use super::{parse_datetime, NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_kind(s: &str) -> Result<NotificationKind, RepositoryError> {
    match s {
        "info" => Ok(NotificationKind::Info),
        "warning" => Ok(NotificationKind::Warning),
        "approval_request" => Ok(NotificationKind::ApprovalRequest),
        "approved" => Ok(NotificationKind::Approved),
        "rejected" => Ok(NotificationKind::Rejected),
        other => Err(RepositoryError::Decode(format!("unknown notification kind `{other}`"))),
    }
}

fn kind_as_str(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Info => "info",
        NotificationKind::Warning => "warning",
        NotificationKind::ApprovalRequest => "approval_request",
        NotificationKind::Approved => "approved",
        NotificationKind::Rejected => "rejected",
    }
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification, RepositoryError> {
    let kind: String = row.try_get("kind")?;
    let request_id: Option<String> = row.try_get("request_id")?;
    let sent_at: String = row.try_get("sent_at")?;

    Ok(Notification {
        id: row.try_get("id")?,
        request_id: request_id.map(RequestId),
        recipient: UserId(row.try_get("recipient_id")?),
        kind: parse_kind(&kind)?,
        subject: row.try_get("subject")?,
        message: row.try_get("message")?,
        read: row.try_get::<i64, _>("read")? != 0,
        sent_at: parse_datetime(&sent_at)?,
    })
}

pub(crate) async fn insert_notification(
    conn: &mut SqliteConnection,
    notification: &Notification,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO notification (id, request_id, recipient_id, kind, subject, message, read, sent_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&notification.id)
    .bind(notification.request_id.as_ref().map(|r| r.0.clone()))
    .bind(&notification.recipient.0)
    .bind(kind_as_str(notification.kind))
    .bind(&notification.subject)
    .bind(&notification.message)
    .bind(notification.read as i64)
    .bind(notification.sent_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn save(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_notification(&mut conn, &notification).await
    }

    async fn inbox_for(
        &self,
        recipient: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let sql = if unread_only {
            "SELECT id, request_id, recipient_id, kind, subject, message, read, sent_at
             FROM notification WHERE recipient_id = ? AND read = 0 ORDER BY sent_at DESC"
        } else {
            "SELECT id, request_id, recipient_id, kind, subject, message, read, sent_at
             FROM notification WHERE recipient_id = ? ORDER BY sent_at DESC"
        };
        let rows = sqlx::query(sql).bind(&recipient.0).fetch_all(&self.pool).await?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn mark_read(&self, id: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE notification SET read = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
