use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use parapheur_core::domain::circuit::{CircuitDefinition, CircuitId, Level, LevelId};
use parapheur_core::domain::request::UserId;
use parapheur_core::domain::workflow_type::{WorkflowType, WorkflowTypeId};
use parapheur_core::routing::{RoutingRule, RoutingRuleId};

use super::{CircuitRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCircuitRepository {
    pool: DbPool,
}

impl SqlCircuitRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn workflow_type_from_row(row: &SqliteRow) -> Result<WorkflowType, RepositoryError> {
    Ok(WorkflowType {
        id: WorkflowTypeId(row.try_get("id")?),
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        active: row.try_get::<i64, _>("active")? != 0,
    })
}

fn rule_from_row(row: &SqliteRow) -> Result<RoutingRule, RepositoryError> {
    let amount_min: Option<String> = row.try_get("amount_min")?;
    let amount_max: Option<String> = row.try_get("amount_max")?;
    Ok(RoutingRule {
        id: RoutingRuleId(row.try_get("id")?),
        name: row.try_get("name")?,
        workflow_type: WorkflowTypeId(row.try_get("workflow_type_id")?),
        circuit_id: CircuitId(row.try_get("circuit_id")?),
        sequence: row.try_get("sequence")?,
        amount_min: amount_min.map(|s| parse_amount(&s)).transpose()?,
        amount_max: amount_max.map(|s| parse_amount(&s)).transpose()?,
        active: row.try_get::<i64, _>("active")? != 0,
    })
}

fn parse_amount(value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(|e| RepositoryError::Decode(format!("bad amount `{value}`: {e}")))
}

pub(crate) async fn fetch_workflow_type_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<WorkflowType>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, code, name, description, active FROM workflow_type WHERE code = ?",
    )
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(ref row) => Ok(Some(workflow_type_from_row(row)?)),
        None => Ok(None),
    }
}

/// Loads a circuit with its levels in stored position order, approvers
/// included.
pub(crate) async fn fetch_circuit(
    conn: &mut SqliteConnection,
    id: &CircuitId,
) -> Result<Option<CircuitDefinition>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, code, name, workflow_type_id, description, active
         FROM circuit_definition WHERE id = ?",
    )
    .bind(&id.0)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let levels = fetch_levels(conn, id).await?;
    Ok(Some(CircuitDefinition {
        id: CircuitId(row.try_get("id")?),
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        workflow_type: WorkflowTypeId(row.try_get("workflow_type_id")?),
        description: row.try_get("description")?,
        active: row.try_get::<i64, _>("active")? != 0,
        levels,
    }))
}

pub(crate) async fn fetch_levels(
    conn: &mut SqliteConnection,
    circuit_id: &CircuitId,
) -> Result<Vec<Level>, RepositoryError> {
    let level_rows = sqlx::query(
        "SELECT id, circuit_id, name, sequence, active
         FROM circuit_level WHERE circuit_id = ? ORDER BY position",
    )
    .bind(&circuit_id.0)
    .fetch_all(&mut *conn)
    .await?;

    let mut levels = Vec::with_capacity(level_rows.len());
    for row in &level_rows {
        let level_id: String = row.try_get("id")?;
        let approver_rows = sqlx::query(
            "SELECT approver_id FROM level_approver WHERE level_id = ? ORDER BY position",
        )
        .bind(&level_id)
        .fetch_all(&mut *conn)
        .await?;
        let approvers = approver_rows
            .iter()
            .map(|r| r.try_get::<String, _>("approver_id").map(UserId))
            .collect::<Result<Vec<_>, _>>()?;

        levels.push(Level {
            id: LevelId(level_id),
            circuit_id: CircuitId(row.try_get("circuit_id")?),
            name: row.try_get("name")?,
            sequence: row.try_get("sequence")?,
            approvers,
            active: row.try_get::<i64, _>("active")? != 0,
        });
    }
    Ok(levels)
}

pub(crate) async fn upsert_circuit(
    conn: &mut SqliteConnection,
    circuit: &CircuitDefinition,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO circuit_definition (id, code, name, workflow_type_id, description, active)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             code = excluded.code,
             name = excluded.name,
             workflow_type_id = excluded.workflow_type_id,
             description = excluded.description,
             active = excluded.active",
    )
    .bind(&circuit.id.0)
    .bind(&circuit.code)
    .bind(&circuit.name)
    .bind(&circuit.workflow_type.0)
    .bind(&circuit.description)
    .bind(circuit.active as i64)
    .execute(&mut *conn)
    .await?;

    // Levels are replaced wholesale; position encodes insertion order.
    sqlx::query(
        "DELETE FROM level_approver WHERE level_id IN
            (SELECT id FROM circuit_level WHERE circuit_id = ?)",
    )
    .bind(&circuit.id.0)
    .execute(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM circuit_level WHERE circuit_id = ?")
        .bind(&circuit.id.0)
        .execute(&mut *conn)
        .await?;

    for (position, level) in circuit.levels.iter().enumerate() {
        sqlx::query(
            "INSERT INTO circuit_level (id, circuit_id, name, sequence, active, position)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&level.id.0)
        .bind(&circuit.id.0)
        .bind(&level.name)
        .bind(level.sequence)
        .bind(level.active as i64)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;

        for (approver_position, approver) in level.approvers.iter().enumerate() {
            sqlx::query(
                "INSERT INTO level_approver (level_id, approver_id, position) VALUES (?, ?, ?)",
            )
            .bind(&level.id.0)
            .bind(&approver.0)
            .bind(approver_position as i64)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

pub(crate) async fn fetch_routing_rules(
    conn: &mut SqliteConnection,
    workflow_type: &WorkflowTypeId,
) -> Result<Vec<RoutingRule>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT id, name, workflow_type_id, circuit_id, sequence, amount_min, amount_max, active
         FROM routing_rule WHERE workflow_type_id = ? ORDER BY position",
    )
    .bind(&workflow_type.0)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(rule_from_row).collect()
}

#[async_trait::async_trait]
impl CircuitRepository for SqlCircuitRepository {
    async fn find_workflow_type_by_code(
        &self,
        code: &str,
    ) -> Result<Option<WorkflowType>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_workflow_type_by_code(&mut conn, code).await
    }

    async fn save_workflow_type(
        &self,
        workflow_type: WorkflowType,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO workflow_type (id, code, name, description, active)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 code = excluded.code,
                 name = excluded.name,
                 description = excluded.description,
                 active = excluded.active",
        )
        .bind(&workflow_type.id.0)
        .bind(&workflow_type.code)
        .bind(&workflow_type.name)
        .bind(&workflow_type.description)
        .bind(workflow_type.active as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_circuit_by_id(
        &self,
        id: &CircuitId,
    ) -> Result<Option<CircuitDefinition>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_circuit(&mut *conn, id).await
    }

    async fn save_circuit(&self, circuit: CircuitDefinition) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        upsert_circuit(&mut *tx, &circuit).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_routing_rules(
        &self,
        workflow_type: &WorkflowTypeId,
    ) -> Result<Vec<RoutingRule>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_routing_rules(&mut *conn, workflow_type).await
    }

    async fn save_routing_rule(&self, rule: RoutingRule) -> Result<(), RepositoryError> {
        let position: i64 = sqlx::query_scalar(
            "SELECT IFNULL(MAX(position) + 1, 0) FROM routing_rule WHERE workflow_type_id = ?",
        )
        .bind(&rule.workflow_type.0)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO routing_rule (id, name, workflow_type_id, circuit_id, sequence,
                                       amount_min, amount_max, active, position)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 workflow_type_id = excluded.workflow_type_id,
                 circuit_id = excluded.circuit_id,
                 sequence = excluded.sequence,
                 amount_min = excluded.amount_min,
                 amount_max = excluded.amount_max,
                 active = excluded.active",
        )
        .bind(&rule.id.0)
        .bind(&rule.name)
        .bind(&rule.workflow_type.0)
        .bind(&rule.circuit_id.0)
        .bind(rule.sequence)
        .bind(rule.amount_min.map(|d| d.to_string()))
        .bind(rule.amount_max.map(|d| d.to_string()))
        .bind(rule.active as i64)
        .bind(position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
