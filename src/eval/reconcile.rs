//! Rounding reconciliation: closes the gap between the sum of computed
//! totals and the declared target total after all nodes have run.
//!
//! Hierarchical programs use a single absorber node; flat programs rescale
//! the scalable formulas (`ratio`, `fallback`) proportionally. Either way
//! the reconciler runs last and is authoritative: meeting the declared
//! total wins over per-node floors, so it may override a remainder's
//! floor, rescale a fallback below its minimum, or move a value a
//! constraint fix had just snapped. Those earlier corrections stay on the
//! record as adjustments.

use super::ledger::{AdjustmentKind, EvaluationAdjustment, Ledger};
use super::options::{AbsorberPolicy, EvaluateOptions};
use crate::program::{Formula, Program};

pub fn reconcile(program: &Program, ledger: &mut Ledger, target_total: f64, options: &EvaluateOptions) {
    let delta = target_total - ledger.sum_total();
    if delta.abs() <= options.rounding_tolerance {
        return;
    }

    if program.has_hierarchy() || !scale_proportionally(program, ledger, target_total) {
        absorb(program, ledger, delta, &options.rounding_absorber);
    }
}

/// Flat-set strategy: rescale `ratio` and `fallback` totals so the
/// aggregate lands on the target; `fixed`, `unit_based`, `remainder` and
/// `derived` totals stay untouched. Returns false when there is nothing
/// to scale (the caller then falls back to the absorber strategy).
fn scale_proportionally(program: &Program, ledger: &mut Ledger, target_total: f64) -> bool {
    let mut scalable = Vec::new();
    let mut scalable_sum = 0.0;
    let mut fixed_sum = 0.0;
    for (idx, value) in ledger.iter_computed() {
        match program.node(idx).formula {
            Formula::Ratio { .. } | Formula::Fallback { .. } => {
                scalable.push(idx);
                scalable_sum += value.total_area;
            }
            _ => fixed_sum += value.total_area,
        }
    }

    if scalable_sum <= 0.0 {
        return false;
    }
    let factor = (target_total - fixed_sum) / scalable_sum;
    if !factor.is_finite() || factor < 0.0 {
        return false;
    }

    for idx in scalable {
        let value = ledger.get_mut(idx).expect("scalable index was taken from iter_computed");
        let original = value.total_area;
        value.set_total(original * factor);
        value.adjustments.push(EvaluationAdjustment {
            kind: AdjustmentKind::Rounding,
            original,
            adjusted: value.total_area,
            reason: format!("proportional rescale by {factor:.6} to meet target total"),
        });
    }
    true
}

/// Single-absorber strategy: pick one node by policy and move the whole
/// delta onto its area-per-unit.
fn absorb(program: &Program, ledger: &mut Ledger, delta: f64, policy: &AbsorberPolicy) {
    let Some(idx) = pick_absorber(program, ledger, policy) else {
        // Nothing computed; the shortfall stays visible in total_area.
        return;
    };

    let value = ledger.get_mut(idx).expect("absorber index was taken from iter_computed");
    let original = value.total_area;
    // An unrecoverable overshoot (e.g. fixed formulas alone exceeding the
    // target) clamps at zero rather than producing a negative space.
    let adjusted = (original + delta).max(0.0);
    value.set_total(adjusted);
    value.adjustments.push(EvaluationAdjustment {
        kind: AdjustmentKind::Rounding,
        original,
        adjusted,
        reason: format!("absorbed rounding delta of {delta:.3} to meet target total"),
    });
}

fn pick_absorber(program: &Program, ledger: &Ledger, policy: &AbsorberPolicy) -> Option<usize> {
    match policy {
        AbsorberPolicy::Node(id) => {
            if let Some(idx) = program.index_of(id).filter(|&idx| ledger.get(idx).is_some()) {
                return Some(idx);
            }
            largest(ledger)
        }
        AbsorberPolicy::Remainder => {
            let mut remainders =
                ledger.iter_computed().filter(|(idx, _)| {
                    matches!(program.node(*idx).formula, Formula::Remainder { .. })
                });
            match (remainders.next(), remainders.next()) {
                // Exactly one remainder node; otherwise the policy is
                // ambiguous and we fall back to the largest node.
                (Some((idx, _)), None) => Some(idx),
                _ => largest(ledger),
            }
        }
        AbsorberPolicy::Largest => largest(ledger),
    }
}

/// Largest single-unit node by total; first declaration wins ties. Falls
/// back to the largest node overall when every node is multi-unit.
fn largest(ledger: &Ledger) -> Option<usize> {
    largest_where(ledger, |count| count == 1).or_else(|| largest_where(ledger, |_| true))
}

fn largest_where(ledger: &Ledger, count_ok: impl Fn(u32) -> bool) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, value) in ledger.iter_computed() {
        if !count_ok(value.count) {
            continue;
        }
        // strict comparison keeps the earliest declaration on ties
        if best.map_or(true, |(_, top)| value.total_area > top) {
            best = Some((idx, value.total_area));
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::ledger::ComputedValue;
    use crate::program::{FormulaNode, NodeId, Reference};
    use smallvec::SmallVec;

    fn fixed_node(id: &str, value: f64) -> FormulaNode {
        FormulaNode::new(id, id, Formula::Fixed { value, count: 1, reasoning: "t".into(), locked: false })
    }

    fn ratio_node(id: &str, ratio: f64) -> FormulaNode {
        FormulaNode::new(
            id,
            id,
            Formula::Ratio { reference: Reference::Total, ratio, reasoning: "t".into(), confidence: None },
        )
    }

    fn computed(program: &Program, idx: usize, total: f64, count: u32) -> ComputedValue {
        ComputedValue {
            area_per_unit: total / f64::from(count),
            count,
            total_area: total,
            inputs: SmallVec::new(),
            adjustments: SmallVec::new(),
            formula: program.node(idx).formula.clone(),
            description: String::new(),
        }
    }

    #[test]
    fn within_tolerance_is_left_alone() {
        let (program, _) = Program::from_nodes(&[fixed_node("a", 999.5)]);
        let mut ledger = Ledger::with_capacity(1);
        ledger.insert(0, computed(&program, 0, 999.5, 1));
        reconcile(&program, &mut ledger, 1000.0, &EvaluateOptions::default());
        assert!(ledger.get(0).unwrap().adjustments.is_empty());
    }

    #[test]
    fn hierarchical_sets_use_a_single_absorber() {
        let root = fixed_node("root", 600.0);
        let child = fixed_node("child", 300.0).with_parent("root");
        let (program, _) = Program::from_nodes(&[root, child]);
        let mut ledger = Ledger::with_capacity(2);
        ledger.insert(0, computed(&program, 0, 600.0, 1));
        ledger.insert(1, computed(&program, 1, 300.0, 1));

        reconcile(&program, &mut ledger, 1000.0, &EvaluateOptions::default());
        // the largest node (root) takes the whole 100-unit gap
        assert!((ledger.total_of(0).unwrap() - 700.0).abs() < 1e-9);
        assert!((ledger.total_of(1).unwrap() - 300.0).abs() < 1e-9);
        assert_eq!(ledger.get(0).unwrap().adjustments.len(), 1);
    }

    #[test]
    fn flat_sets_rescale_ratio_nodes_and_leave_fixed_alone() {
        let nodes =
            vec![fixed_node("fixed", 400.0), ratio_node("a", 0.3), ratio_node("b", 0.2)];
        let (program, _) = Program::from_nodes(&nodes);
        let mut ledger = Ledger::with_capacity(3);
        ledger.insert(0, computed(&program, 0, 400.0, 1));
        ledger.insert(1, computed(&program, 1, 300.0, 1));
        ledger.insert(2, computed(&program, 2, 200.0, 1));

        // sum is 900, target 1000: the 600 scalable units stretch to 600 * 1.2
        reconcile(&program, &mut ledger, 1000.0, &EvaluateOptions::default());
        assert!((ledger.total_of(0).unwrap() - 400.0).abs() < 1e-9);
        assert!((ledger.total_of(1).unwrap() - 360.0).abs() < 1e-9);
        assert!((ledger.total_of(2).unwrap() - 240.0).abs() < 1e-9);
        assert!((ledger.sum_total() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn explicit_absorber_policy_targets_the_named_node() {
        let root = fixed_node("root", 500.0);
        let side = fixed_node("side", 490.0).with_parent("root");
        let (program, _) = Program::from_nodes(&[root, side]);
        let mut ledger = Ledger::with_capacity(2);
        ledger.insert(0, computed(&program, 0, 500.0, 1));
        ledger.insert(1, computed(&program, 1, 490.0, 1));

        let options = EvaluateOptions {
            rounding_absorber: AbsorberPolicy::Node(NodeId::from("side")),
            ..EvaluateOptions::default()
        };
        reconcile(&program, &mut ledger, 1000.0, &options);
        assert!((ledger.total_of(1).unwrap() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn absorber_never_goes_negative_on_unrecoverable_overshoot() {
        let a = fixed_node("a", 900.0);
        let b = fixed_node("b", 300.0).with_parent("a");
        let (program, _) = Program::from_nodes(&[a, b]);
        let mut ledger = Ledger::with_capacity(2);
        ledger.insert(0, computed(&program, 0, 900.0, 1));
        ledger.insert(1, computed(&program, 1, 300.0, 1));

        // delta is -1100 against the 900 absorber: clamps at zero
        reconcile(&program, &mut ledger, 100.0, &EvaluateOptions::default());
        assert!((ledger.total_of(0).unwrap() - 0.0).abs() < 1e-9);
    }
}
