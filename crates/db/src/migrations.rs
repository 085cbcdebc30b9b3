use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR, DbPool};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "workflow_type",
        "circuit_definition",
        "circuit_level",
        "level_approver",
        "routing_rule",
        "workflow_request",
        "request_document",
        "request_approval",
        "request_comment",
        "audit_log",
        "notification",
        "reference_sequence",
        "idx_circuit_level_circuit_id",
        "idx_routing_rule_workflow_type",
        "idx_workflow_request_state",
        "idx_workflow_request_requester",
        "idx_request_document_request_id",
        "idx_request_approval_request_id",
        "idx_request_approval_approver_state",
        "idx_request_comment_request_id",
        "idx_audit_log_request_id",
        "idx_notification_recipient",
    ];

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn object_exists(pool: &DbPool, name: &str) -> bool {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'index') AND name = ?",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("query sqlite_master");
        count == 1
    }

    /// `(type, name, sql)` of every managed object, sorted for comparison.
    async fn schema_signature(pool: &DbPool) -> Vec<(String, String, String)> {
        let mut rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT type, name, IFNULL(sql, '')
             FROM sqlite_master WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects");
        rows.retain(|(_, name, _)| MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()));
        rows.sort();
        rows
    }

    #[tokio::test]
    async fn baseline_creates_every_managed_object() {
        let pool = migrated_pool().await;

        for name in MANAGED_SCHEMA_OBJECTS {
            assert!(object_exists(&pool, name).await, "`{name}` should exist after migration");
        }
    }

    #[tokio::test]
    async fn full_undo_drops_the_schema() {
        let pool = migrated_pool().await;
        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        assert!(!object_exists(&pool, "workflow_request").await);
        assert!(schema_signature(&pool).await.is_empty());
    }

    #[tokio::test]
    async fn up_down_up_round_trips_the_signature() {
        let pool = migrated_pool().await;
        let initial = schema_signature(&pool).await;
        assert_eq!(initial.len(), MANAGED_SCHEMA_OBJECTS.len());

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        run_pending(&pool).await.expect("re-run migrations");

        assert_eq!(schema_signature(&pool).await, initial);
    }
}
