//! Cross-checks parent totals against the sum of their children.
//!
//! Mismatches are reported, never corrected: a parent disagreeing with its
//! children is a legitimate user-visible state mid-edit, not necessarily a
//! bug in the program.

use crate::eval::ledger::Ledger;
use crate::eval::result::HierarchyMismatch;
use crate::program::Program;

/// Audits every node that declares children. Children that were excluded
/// from evaluation contribute nothing to the sum.
pub fn audit(program: &Program, ledger: &Ledger, tolerance: f64) -> Vec<HierarchyMismatch> {
    let mut mismatches = Vec::new();

    for idx in 0..program.len() {
        let children = program.children_of(idx);
        if children.is_empty() {
            continue;
        }
        let Some(parent_total) = ledger.total_of(idx) else {
            continue;
        };

        let children_sum: f64 = children.iter().filter_map(|&c| ledger.total_of(c)).sum();
        let difference = parent_total - children_sum;
        if difference.abs() > tolerance {
            mismatches.push(HierarchyMismatch {
                parent_id: program.node(idx).id.clone(),
                parent_total,
                children_sum,
                difference,
            });
        }
    }

    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::ledger::ComputedValue;
    use crate::program::{Formula, FormulaNode};
    use smallvec::SmallVec;

    fn fixed_node(id: &str, value: f64) -> FormulaNode {
        FormulaNode::new(id, id, Formula::Fixed { value, count: 1, reasoning: "t".into(), locked: false })
    }

    fn computed(program: &Program, idx: usize, total: f64) -> ComputedValue {
        ComputedValue {
            area_per_unit: total,
            count: 1,
            total_area: total,
            inputs: SmallVec::new(),
            adjustments: SmallVec::new(),
            formula: program.node(idx).formula.clone(),
            description: String::new(),
        }
    }

    fn family(parent_total: f64, a: f64, b: f64) -> (Program, Ledger) {
        let nodes = vec![
            fixed_node("wing", parent_total),
            fixed_node("a", a).with_parent("wing"),
            fixed_node("b", b).with_parent("wing"),
        ];
        let (program, _) = Program::from_nodes(&nodes);
        let mut ledger = Ledger::with_capacity(3);
        for idx in 0..3 {
            let total = [parent_total, a, b][idx];
            ledger.insert(idx, computed(&program, idx, total));
        }
        (program, ledger)
    }

    #[test]
    fn consistent_families_pass() {
        let (program, ledger) = family(500.0, 300.0, 200.0);
        assert!(audit(&program, &ledger, 1.0).is_empty());
    }

    #[test]
    fn mismatch_beyond_tolerance_is_reported_not_fixed() {
        let (program, ledger) = family(500.0, 300.0, 150.0);
        let mismatches = audit(&program, &ledger, 1.0);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].parent_id.as_str(), "wing");
        assert!((mismatches[0].difference - 50.0).abs() < 1e-9);
        // totals untouched
        assert!((ledger.total_of(0).unwrap() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn mismatch_within_tolerance_is_ignored() {
        let (program, ledger) = family(500.0, 300.0, 199.5);
        assert!(audit(&program, &ledger, 1.0).is_empty());
    }
}
