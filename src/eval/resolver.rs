//! Resolves a symbolic reference to a previously computed numeric area.

use super::ledger::{EvalError, InputTrace, Ledger};
use crate::program::{Program, Reference};
use smallvec::SmallVec;

/// A resolved reference: the numeric value plus the trace entries that
/// explain where it came from.
#[derive(Debug)]
pub struct Resolved {
    pub value: f64,
    pub inputs: SmallVec<[InputTrace; 4]>,
}

impl Resolved {
    fn one(name: impl Into<String>, value: f64) -> Self {
        let mut inputs = SmallVec::new();
        inputs.push(InputTrace::new(name, value));
        Self { value, inputs }
    }
}

/// Resolves `reference` from the viewpoint of the node at `idx`.
///
/// - `total` always resolves to the declared root total.
/// - `parent` resolves to the computed parent total; for root-level nodes,
///   or when the parent has not been computed, it falls back to the root
///   total and the trace entry says so explicitly.
/// - `sibling_sum` sums computed same-parent totals; siblings not yet
///   computed contribute zero.
/// - An explicit node reference must already be computed, otherwise the
///   referencing node fails locally.
pub fn resolve(
    reference: &Reference,
    idx: usize,
    program: &Program,
    ledger: &Ledger,
    root_total: f64,
) -> Result<Resolved, EvalError> {
    let node = program.node(idx);
    match reference {
        Reference::Total => Ok(Resolved::one("total", root_total)),

        Reference::Parent => {
            let computed_parent = node
                .parent
                .as_ref()
                .and_then(|pid| program.index_of(pid))
                .and_then(|p_idx| ledger.total_of(p_idx));
            match (computed_parent, &node.parent) {
                (Some(total), Some(pid)) => Ok(Resolved::one(format!("parent '{pid}'"), total)),
                // Root-level node, or parent not evaluated yet: auditable
                // fallback to the root total, not a hidden substitution.
                _ => Ok(Resolved::one("total (parent fallback)", root_total)),
            }
        }

        Reference::SiblingSum => {
            let mut sum = 0.0;
            for sib_idx in program.siblings_of(idx) {
                if let Some(total) = ledger.total_of(sib_idx) {
                    sum += total;
                }
            }
            Ok(Resolved::one("sibling_sum", sum))
        }

        Reference::Node(target) => {
            let target_idx = program.index_of(target).ok_or_else(|| EvalError::UnknownNode {
                node: node.id.clone(),
                reference: target.clone(),
            })?;
            let total = ledger.total_of(target_idx).ok_or_else(|| EvalError::UnresolvedReference {
                node: node.id.clone(),
                reference: target.clone(),
            })?;
            Ok(Resolved::one(format!("node '{target}'"), total))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::ledger::ComputedValue;
    use crate::program::{Formula, FormulaNode, NodeId};

    fn ratio_node(id: &str, ratio: f64) -> FormulaNode {
        FormulaNode::new(
            id,
            id,
            Formula::Ratio { reference: Reference::Total, ratio, reasoning: "t".into(), confidence: None },
        )
    }

    fn computed(total: f64, formula: Formula) -> ComputedValue {
        ComputedValue {
            area_per_unit: total,
            count: 1,
            total_area: total,
            inputs: SmallVec::new(),
            adjustments: SmallVec::new(),
            formula,
            description: String::new(),
        }
    }

    fn program_and_ledger() -> (Program, Ledger) {
        let parent = ratio_node("p", 0.8);
        let a = ratio_node("a", 0.5).with_parent("p");
        let b = ratio_node("b", 0.3).with_parent("p");
        let c = ratio_node("c", 0.2).with_parent("p");
        let (program, _) = Program::from_nodes(&[parent, a, b, c]);
        let mut ledger = Ledger::with_capacity(program.len());
        ledger.insert(0, computed(800.0, program.node(0).formula.clone()));
        ledger.insert(1, computed(400.0, program.node(1).formula.clone()));
        (program, ledger)
    }

    #[test]
    fn parent_resolves_to_computed_parent_total() {
        let (program, ledger) = program_and_ledger();
        let r = resolve(&Reference::Parent, 2, &program, &ledger, 1000.0).unwrap();
        assert!((r.value - 800.0).abs() < 1e-9);
        assert_eq!(r.inputs[0].name, "parent 'p'");
    }

    #[test]
    fn parent_fallback_to_total_is_traced() {
        let (program, ledger) = program_and_ledger();
        // node 0 is root-level: no parent declared
        let r = resolve(&Reference::Parent, 0, &program, &ledger, 1000.0).unwrap();
        assert!((r.value - 1000.0).abs() < 1e-9);
        assert_eq!(r.inputs[0].name, "total (parent fallback)");
    }

    #[test]
    fn sibling_sum_counts_only_computed_siblings() {
        let (program, ledger) = program_and_ledger();
        // from c's viewpoint: siblings a (computed, 400) and b (uncomputed, 0)
        let r = resolve(&Reference::SiblingSum, 3, &program, &ledger, 1000.0).unwrap();
        assert!((r.value - 400.0).abs() < 1e-9);
    }

    #[test]
    fn explicit_reference_to_uncomputed_node_fails_locally() {
        let (program, ledger) = program_and_ledger();
        let err = resolve(&Reference::Node(NodeId::from("b")), 3, &program, &ledger, 1000.0)
            .unwrap_err();
        assert!(matches!(err, EvalError::UnresolvedReference { .. }));

        let err = resolve(&Reference::Node(NodeId::from("ghost")), 3, &program, &ledger, 1000.0)
            .unwrap_err();
        assert!(matches!(err, EvalError::UnknownNode { .. }));
    }
}
