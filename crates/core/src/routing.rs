use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::circuit::CircuitId;
use crate::domain::workflow_type::WorkflowTypeId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingRuleId(pub String);

/// Amount-range rule assigning new requests of one workflow type to a
/// circuit. The range is half-open: `amount_min` inclusive, `amount_max`
/// exclusive; either bound may be absent (unbounded).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: RoutingRuleId,
    pub name: String,
    pub workflow_type: WorkflowTypeId,
    pub circuit_id: CircuitId,
    pub sequence: i32,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
    pub active: bool,
}

impl RoutingRule {
    fn matches(&self, amount: Decimal) -> bool {
        if let Some(min) = self.amount_min {
            if amount < min {
                return false;
            }
        }
        if let Some(max) = self.amount_max {
            if amount >= max {
                return false;
            }
        }
        true
    }
}

/// Resolves the circuit for a new request. Pure and deterministic given the
/// current rule set; no side effects.
#[derive(Clone, Debug, Default)]
pub struct CircuitRouter {
    rules: Vec<RoutingRule>,
}

impl CircuitRouter {
    /// Rules are evaluated in ascending `sequence` order; the sort is
    /// stable, so insertion order decides between equal sequences.
    pub fn new(mut rules: Vec<RoutingRule>) -> Self {
        rules.sort_by_key(|rule| rule.sequence);
        Self { rules }
    }

    /// First-match wins. Returns `None` when no active rule of the given
    /// workflow type covers the amount; the request then has no circuit.
    pub fn resolve(&self, workflow_type: &WorkflowTypeId, amount: Decimal) -> Option<&CircuitId> {
        self.rules
            .iter()
            .filter(|rule| rule.active && rule.workflow_type == *workflow_type)
            .find(|rule| rule.matches(amount))
            .map(|rule| &rule.circuit_id)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{CircuitRouter, RoutingRule, RoutingRuleId};
    use crate::domain::circuit::CircuitId;
    use crate::domain::workflow_type::WorkflowTypeId;

    fn credit_type() -> WorkflowTypeId {
        WorkflowTypeId("wt-credit".to_string())
    }

    fn rule(
        id: &str,
        sequence: i32,
        min: Option<i64>,
        max: Option<i64>,
        circuit: &str,
    ) -> RoutingRule {
        RoutingRule {
            id: RoutingRuleId(id.to_string()),
            name: format!("rule {id}"),
            workflow_type: credit_type(),
            circuit_id: CircuitId(circuit.to_string()),
            sequence,
            amount_min: min.map(Decimal::from),
            amount_max: max.map(Decimal::from),
            active: true,
        }
    }

    fn tiered_router() -> CircuitRouter {
        CircuitRouter::new(vec![
            rule("r-small", 10, Some(0), Some(5_000_000), "circuit-a"),
            rule("r-medium", 20, Some(5_000_000), Some(25_000_000), "circuit-b"),
            rule("r-large", 30, Some(25_000_000), None, "circuit-c"),
        ])
    }

    #[test]
    fn boundary_amount_belongs_to_the_upper_rule() {
        let router = tiered_router();
        let circuit = router.resolve(&credit_type(), Decimal::from(5_000_000));
        assert_eq!(circuit, Some(&CircuitId("circuit-b".to_string())));
    }

    #[test]
    fn lower_bound_is_inclusive_and_upper_exclusive() {
        let router = tiered_router();
        assert_eq!(
            router.resolve(&credit_type(), Decimal::from(4_999_999)),
            Some(&CircuitId("circuit-a".to_string()))
        );
        assert_eq!(
            router.resolve(&credit_type(), Decimal::from(25_000_000)),
            Some(&CircuitId("circuit-c".to_string()))
        );
    }

    #[test]
    fn first_match_in_sequence_order_wins_over_overlap() {
        let router = CircuitRouter::new(vec![
            rule("r-broad", 20, None, None, "circuit-fallback"),
            rule("r-narrow", 10, Some(1_000), Some(2_000), "circuit-narrow"),
        ]);

        assert_eq!(
            router.resolve(&credit_type(), Decimal::from(1_500)),
            Some(&CircuitId("circuit-narrow".to_string()))
        );
        assert_eq!(
            router.resolve(&credit_type(), Decimal::from(10_000)),
            Some(&CircuitId("circuit-fallback".to_string()))
        );
    }

    #[test]
    fn equal_sequences_fall_back_to_insertion_order() {
        let router = CircuitRouter::new(vec![
            rule("r-first", 10, None, None, "circuit-first"),
            rule("r-second", 10, None, None, "circuit-second"),
        ]);

        assert_eq!(
            router.resolve(&credit_type(), Decimal::ONE),
            Some(&CircuitId("circuit-first".to_string()))
        );
    }

    #[test]
    fn inactive_rules_and_foreign_types_are_skipped() {
        let mut inactive = rule("r-small", 10, Some(0), Some(5_000_000), "circuit-a");
        inactive.active = false;
        let mut foreign = rule("r-mail", 5, None, None, "circuit-mail");
        foreign.workflow_type = WorkflowTypeId("wt-courrier".to_string());
        let router = CircuitRouter::new(vec![inactive, foreign]);

        assert_eq!(router.resolve(&credit_type(), Decimal::from(1_000)), None);
    }

    #[test]
    fn no_match_yields_no_circuit() {
        let router = CircuitRouter::new(vec![rule(
            "r-small",
            10,
            Some(0),
            Some(5_000_000),
            "circuit-a",
        )]);
        assert_eq!(router.resolve(&credit_type(), Decimal::from(9_000_000)), None);
    }
}
