//! The tree evaluation orchestrator: schedules nodes, evaluates each one,
//! checks constraints, reconciles rounding, audits the hierarchy, and
//! assembles the structured result.
//!
//! The engine is a pure, synchronous batch computation over an immutable
//! snapshot. It holds no state between calls, and no failure mode escapes
//! `evaluate` as a panic: malformed or locally failed nodes are excluded
//! with warnings and the run continues.

use super::evaluator::evaluate_node;
use super::ledger::{ComputedValue, EvalError, Ledger};
use super::options::EvaluateOptions;
use super::reconcile::reconcile;
use super::result::{EvaluationWarning, Severity, TreeEvaluationResult, WarningKind};
use super::scheduler::evaluation_order;
use crate::display::describe::describe;
use crate::program::{Formula, FormulaNode, Program};
use crate::validation::{constraints, hierarchy};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Evaluates an ordered list of formula nodes against a target root total.
///
/// This is the engine's entire public interface; the surrounding
/// application feeds it collaborator- or user-authored nodes and reads the
/// structured result.
pub fn evaluate(
    nodes: &[FormulaNode],
    target_total: f64,
    options: &EvaluateOptions,
) -> TreeEvaluationResult {
    if !target_total.is_finite() || target_total <= 0.0 {
        return TreeEvaluationResult::rejected(format!(
            "target total must be a positive number, got {target_total}"
        ));
    }

    let (program, duplicates) = Program::from_nodes(nodes);
    let warnings: Vec<EvaluationWarning> = duplicates
        .iter()
        .map(|id| {
            EvaluationWarning::for_node(
                id,
                WarningKind::DuplicateNode,
                format!("node id '{id}' was declared more than once; later declarations dropped"),
            )
        })
        .collect();

    TreeEvaluator { program: &program, options }.run(target_total, warnings)
}

/// Borrows the snapshot for the duration of one run, the same way the
/// ledger is threaded through explicitly: evaluation order is visible in
/// the call structure, not implicit in shared mutable state.
struct TreeEvaluator<'a> {
    program: &'a Program,
    options: &'a EvaluateOptions,
}

impl<'a> TreeEvaluator<'a> {
    fn run(&self, target_total: f64, mut warnings: Vec<EvaluationWarning>) -> TreeEvaluationResult {
        let mut ledger = Ledger::with_capacity(self.program.len());
        let mut violations = Vec::new();
        let mut deferred: Vec<(usize, usize)> = Vec::new();

        for idx in evaluation_order(self.program) {
            let node = self.program.node(idx);

            let raw = match evaluate_node(idx, self.program, &ledger, target_total) {
                Ok(raw) => raw,
                Err(err) => {
                    warnings.push(EvaluationWarning::for_node(
                        &node.id,
                        warning_kind_for(&err),
                        err.to_string(),
                    ));
                    continue;
                }
            };

            if let Formula::Fallback { method, missing_info, user_prompts, .. } = &node.formula {
                warnings.push(fallback_warning(node, *method, missing_info, user_prompts));
            }

            let description = describe(&node.formula, raw.total);
            ledger.insert(
                idx,
                ComputedValue {
                    area_per_unit: raw.area_per_unit,
                    count: raw.count,
                    total_area: raw.total,
                    inputs: raw.inputs,
                    adjustments: SmallVec::new(),
                    formula: node.formula.clone(),
                    description,
                },
            );

            let outcome = constraints::check_node(
                idx,
                self.program,
                &mut ledger,
                target_total,
                self.options.auto_fix_constraints,
            );
            violations.extend(outcome.violations);
            deferred.extend(outcome.deferred.into_iter().map(|c_idx| (idx, c_idx)));
        }

        // constraints that referenced a later-scheduled node get their
        // verdict now, against the completed ledger
        violations.extend(constraints::recheck_deferred(
            &deferred,
            self.program,
            &mut ledger,
            target_total,
            self.options.auto_fix_constraints,
        ));

        reconcile(self.program, &mut ledger, target_total, self.options);

        let hierarchy_errors =
            hierarchy::audit(self.program, &ledger, self.options.rounding_tolerance);

        let mut computed = BTreeMap::new();
        for (idx, value) in ledger.iter_computed() {
            computed.insert(self.program.node(idx).id.clone(), value.clone());
        }
        let total_area = ledger.sum_total();
        let success = !violations.iter().any(|v| v.severity == Severity::Error);

        TreeEvaluationResult {
            success,
            computed,
            total_area,
            violations,
            warnings,
            hierarchy_valid: hierarchy_errors.is_empty(),
            hierarchy_errors,
        }
    }
}

fn warning_kind_for(err: &EvalError) -> WarningKind {
    match err {
        EvalError::MalformedFormula { .. } => WarningKind::MalformedNode,
        _ => WarningKind::UnresolvedReference,
    }
}

fn fallback_warning(
    node: &FormulaNode,
    method: crate::program::FallbackMethod,
    missing_info: &[String],
    user_prompts: &[String],
) -> EvaluationWarning {
    let label = match method {
        crate::program::FallbackMethod::EqualShare => "equal-share",
        crate::program::FallbackMethod::TypologyGuess => "typology-guess",
        crate::program::FallbackMethod::MinimumViable => "minimum-viable",
    };
    let mut message = format!("'{}' used a {label} fallback", node.name);
    if !missing_info.is_empty() {
        message.push_str(&format!("; missing: {}", missing_info.join(", ")));
    }
    if !user_prompts.is_empty() {
        message.push_str(&format!("; please clarify: {}", user_prompts.join(" / ")));
    }
    EvaluationWarning::for_node(&node.id, WarningKind::FallbackUsed, message)
}
