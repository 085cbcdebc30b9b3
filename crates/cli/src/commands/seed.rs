use crate::commands::{with_pool, CommandError, CommandResult};
use parapheur_core::{
    CircuitDefinition, CircuitId, Level, LevelId, RoutingRule, RoutingRuleId, UserId, WorkflowType,
    WorkflowTypeId,
};
use parapheur_db::{migrations, CircuitRepository, DbPool, SqlCircuitRepository};
use rust_decimal::Decimal;

/// Deterministic demo topology: two workflow types, three credit circuits
/// split by amount band plus one correspondence circuit. Every write is an
/// upsert, so re-running the command is a no-op.
pub fn run() -> CommandResult {
    with_pool("seed", |pool, _config| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        load_fixtures(&pool).await?;
        Ok([
            "seeded demo workflow configuration:",
            "  - CRD: Demandes de crédit (3 circuits, amount-banded)",
            "    - CIR-A: < 5 000 000 (Chef d'agence)",
            "    - CIR-B: 5 000 000 .. 25 000 000 (Chef d'agence + Risques, Directeur)",
            "    - CIR-C: >= 25 000 000 (Chef d'agence, Directeur, Conseil)",
            "  - COU: Courrier entrant (1 circuit: Secrétariat de direction)",
        ]
        .join("\n"))
    })
}

async fn load_fixtures(pool: &DbPool) -> Result<(), CommandError> {
    let circuits = SqlCircuitRepository::new(pool.clone());
    let storage = |error: parapheur_db::RepositoryError| ("seed_execution", error.to_string(), 5u8);

    circuits
        .save_workflow_type(workflow_type("wt-credit", "CRD", "Demandes de crédit"))
        .await
        .map_err(storage)?;
    circuits
        .save_workflow_type(workflow_type("wt-courrier", "COU", "Courrier entrant"))
        .await
        .map_err(storage)?;

    circuits
        .save_circuit(circuit(
            "circuit-a",
            "CIR-A",
            "Petits crédits",
            "wt-credit",
            vec![level("a1", "circuit-a", "Chef d'agence", 10, &["chef.agence"])],
        ))
        .await
        .map_err(storage)?;
    circuits
        .save_circuit(circuit(
            "circuit-b",
            "CIR-B",
            "Crédits moyens",
            "wt-credit",
            vec![
                level("b1", "circuit-b", "Chef d'agence", 10, &["chef.agence", "resp.risques"]),
                level("b2", "circuit-b", "Directeur", 20, &["directeur"]),
            ],
        ))
        .await
        .map_err(storage)?;
    circuits
        .save_circuit(circuit(
            "circuit-c",
            "CIR-C",
            "Grands crédits",
            "wt-credit",
            vec![
                level("c1", "circuit-c", "Chef d'agence", 10, &["chef.agence"]),
                level("c2", "circuit-c", "Directeur", 20, &["directeur"]),
                level("c3", "circuit-c", "Conseil", 30, &["conseil"]),
            ],
        ))
        .await
        .map_err(storage)?;
    circuits
        .save_circuit(circuit(
            "circuit-courrier",
            "CIR-COU",
            "Courrier entrant",
            "wt-courrier",
            vec![level("m1", "circuit-courrier", "Secrétariat de direction", 10, &["secretariat"])],
        ))
        .await
        .map_err(storage)?;

    circuits
        .save_routing_rule(rule("rule-a", 10, None, Some(5_000_000), "circuit-a"))
        .await
        .map_err(storage)?;
    circuits
        .save_routing_rule(rule("rule-b", 20, Some(5_000_000), Some(25_000_000), "circuit-b"))
        .await
        .map_err(storage)?;
    circuits
        .save_routing_rule(rule("rule-c", 30, Some(25_000_000), None, "circuit-c"))
        .await
        .map_err(storage)?;

    Ok(())
}

fn workflow_type(id: &str, code: &str, name: &str) -> WorkflowType {
    WorkflowType {
        id: WorkflowTypeId(id.to_string()),
        code: code.to_string(),
        name: name.to_string(),
        description: None,
        active: true,
    }
}

fn circuit(
    id: &str,
    code: &str,
    name: &str,
    workflow_type: &str,
    levels: Vec<Level>,
) -> CircuitDefinition {
    CircuitDefinition {
        id: CircuitId(id.to_string()),
        code: code.to_string(),
        name: name.to_string(),
        workflow_type: WorkflowTypeId(workflow_type.to_string()),
        description: None,
        active: true,
        levels,
    }
}

fn level(id: &str, circuit_id: &str, name: &str, sequence: i32, approvers: &[&str]) -> Level {
    Level {
        id: LevelId(id.to_string()),
        circuit_id: CircuitId(circuit_id.to_string()),
        name: name.to_string(),
        sequence,
        approvers: approvers.iter().map(|user| UserId((*user).to_string())).collect(),
        active: true,
    }
}

fn rule(
    id: &str,
    sequence: i32,
    amount_min: Option<i64>,
    amount_max: Option<i64>,
    circuit_id: &str,
) -> RoutingRule {
    RoutingRule {
        id: RoutingRuleId(id.to_string()),
        name: format!("band-{sequence}"),
        workflow_type: WorkflowTypeId("wt-credit".to_string()),
        circuit_id: CircuitId(circuit_id.to_string()),
        sequence,
        amount_min: amount_min.map(Decimal::from),
        amount_max: amount_max.map(Decimal::from),
        active: true,
    }
}
