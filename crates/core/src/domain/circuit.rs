use serde::{Deserialize, Serialize};

use crate::domain::request::UserId;
use crate::domain::workflow_type::WorkflowTypeId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CircuitId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelId(pub String);

/// One stage in a validation circuit. `sequence` defines the total order of
/// levels within a circuit; it is not required to be unique, and levels
/// sharing a sequence form a single approval rank. Ties in next/previous
/// lookups are broken by position in the circuit's level list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    pub circuit_id: CircuitId,
    pub name: String,
    pub sequence: i32,
    pub approvers: Vec<UserId>,
    pub active: bool,
}

/// A named circuit of approval levels for one workflow type.
///
/// Levels are soft-deactivated, never removed while approvals reference
/// them, so callers work on `active_levels()` rather than `levels`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitDefinition {
    pub id: CircuitId,
    pub code: String,
    pub name: String,
    pub workflow_type: WorkflowTypeId,
    pub description: Option<String>,
    pub active: bool,
    pub levels: Vec<Level>,
}

impl CircuitDefinition {
    /// Active levels ordered by `(sequence, position)`. The sort is stable,
    /// so insertion order decides between levels with equal sequences.
    pub fn active_levels(&self) -> Vec<Level> {
        let mut levels: Vec<Level> =
            self.levels.iter().filter(|level| level.active).cloned().collect();
        levels.sort_by_key(|level| level.sequence);
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::{CircuitDefinition, CircuitId, Level, LevelId};
    use crate::domain::request::UserId;
    use crate::domain::workflow_type::WorkflowTypeId;

    fn level(id: &str, sequence: i32, active: bool) -> Level {
        Level {
            id: LevelId(id.to_string()),
            circuit_id: CircuitId("circuit-a".to_string()),
            name: format!("Level {id}"),
            sequence,
            approvers: vec![UserId("u-agent".to_string())],
            active,
        }
    }

    #[test]
    fn active_levels_are_ordered_by_sequence_then_insertion() {
        let circuit = CircuitDefinition {
            id: CircuitId("circuit-a".to_string()),
            code: "CIR-A".to_string(),
            name: "Circuit A".to_string(),
            workflow_type: WorkflowTypeId("wt-credit".to_string()),
            description: None,
            active: true,
            levels: vec![
                level("lvl-3", 30, true),
                level("lvl-1b", 10, true),
                level("lvl-2", 20, false),
                level("lvl-1a", 10, true),
            ],
        };

        let ordered: Vec<String> =
            circuit.active_levels().into_iter().map(|l| l.id.0).collect();
        assert_eq!(ordered, vec!["lvl-1b", "lvl-1a", "lvl-3"]);
    }
}
