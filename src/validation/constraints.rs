//! Per-node constraint checking and auto-fixing, run right after each
//! node's raw value is produced. A linting pass: every violation is
//! collected, nothing aborts the run. Checks whose reference is not
//! computed yet are deferred and replayed once the whole program has run,
//! so every declared constraint gets exactly one verdict.

use crate::eval::ledger::{AdjustmentKind, EvaluationAdjustment, Ledger};
use crate::eval::result::{ConstraintViolation, Severity};
use crate::program::{Constraint, Program, DEFAULT_TOLERANCE};

const EXACT_EPS: f64 = 1e-6;

/// Result of checking one node's constraints: the violations left unfixed,
/// plus the positions of constraints whose reference was not computed yet.
/// The scheduler may legitimately run the referenced node later, so deferred
/// checks are replayed against the completed ledger instead of being lost.
pub struct CheckOutcome {
    pub violations: Vec<ConstraintViolation>,
    pub deferred: Vec<usize>,
}

/// Checks every constraint declared on the node at `idx`, snapping the
/// value into compliance when `auto_fix` is on.
pub fn check_node(
    idx: usize,
    program: &Program,
    ledger: &mut Ledger,
    root_total: f64,
    auto_fix: bool,
) -> CheckOutcome {
    let mut outcome = CheckOutcome { violations: Vec::new(), deferred: Vec::new() };
    for c_idx in 0..program.node(idx).constraints.len() {
        match check_one(idx, c_idx, program, ledger, root_total, auto_fix) {
            Checked::Settled => {}
            Checked::Violation(v) => outcome.violations.push(v),
            Checked::Deferred => outcome.deferred.push(c_idx),
        }
    }
    outcome
}

/// Replays `(node index, constraint index)` pairs deferred during the
/// evaluation loop, now that every node has had its chance to compute.
/// Constraints that still cannot resolve (their reference was excluded
/// from evaluation, or names an unknown node) stay skipped.
pub fn recheck_deferred(
    deferred: &[(usize, usize)],
    program: &Program,
    ledger: &mut Ledger,
    root_total: f64,
    auto_fix: bool,
) -> Vec<ConstraintViolation> {
    let mut violations = Vec::new();
    for &(idx, c_idx) in deferred {
        if let Checked::Violation(v) = check_one(idx, c_idx, program, ledger, root_total, auto_fix) {
            violations.push(v);
        }
    }
    violations
}

enum Checked {
    /// Passed, or violated and snapped into compliance.
    Settled,
    Violation(ConstraintViolation),
    Deferred,
}

fn check_one(
    idx: usize,
    c_idx: usize,
    program: &Program,
    ledger: &mut Ledger,
    root_total: f64,
    auto_fix: bool,
) -> Checked {
    let node = program.node(idx);
    let constraint = &node.constraints[c_idx];
    let Some(actual) = ledger.total_of(idx) else {
        return Checked::Settled; // node itself was excluded; nothing to check
    };
    let Some(check) = evaluate_constraint(constraint, actual, idx, program, ledger, root_total)
    else {
        return Checked::Deferred;
    };
    if !check.violated {
        return Checked::Settled;
    }

    if auto_fix {
        let value = ledger.get_mut(idx).expect("checked above via total_of");
        value.set_total(check.expected);
        value.adjustments.push(EvaluationAdjustment {
            kind: check.kind,
            original: actual,
            adjusted: check.expected,
            reason: format!("{} constraint", constraint.kind_name()),
        });
        Checked::Settled
    } else {
        Checked::Violation(ConstraintViolation {
            node_id: node.id.clone(),
            constraint: constraint.clone(),
            expected: check.expected,
            actual,
            severity: check.severity,
            auto_fixable: true,
        })
    }
}

struct ConstraintCheck {
    violated: bool,
    expected: f64,
    severity: Severity,
    kind: AdjustmentKind,
}

/// Resolves the constraint's reference and compares. `None` means the
/// reference is unavailable and the check is skipped.
fn evaluate_constraint(
    constraint: &Constraint,
    actual: f64,
    idx: usize,
    program: &Program,
    ledger: &Ledger,
    root_total: f64,
) -> Option<ConstraintCheck> {
    match constraint {
        Constraint::Minimum { value, .. } => Some(ConstraintCheck {
            violated: actual + EXACT_EPS < *value,
            expected: *value,
            severity: Severity::Error,
            kind: AdjustmentKind::ConstraintMin,
        }),

        Constraint::Maximum { value, .. } => Some(ConstraintCheck {
            violated: actual - EXACT_EPS > *value,
            expected: *value,
            severity: Severity::Error,
            kind: AdjustmentKind::ConstraintMax,
        }),

        Constraint::RatioToSibling { sibling, ratio, tolerance, .. } => {
            let sib_total = ledger.total_of(program.index_of(sibling)?)?;
            let expected = sib_total * ratio;
            Some(ratio_check(actual, expected, tolerance.unwrap_or(DEFAULT_TOLERANCE)))
        }

        Constraint::RatioToParent { ratio, tolerance, .. } => {
            // Same fallback the resolver uses: a root-level node's "parent"
            // is the declared total.
            let parent_total = program
                .node(idx)
                .parent
                .as_ref()
                .and_then(|pid| program.index_of(pid))
                .and_then(|p_idx| ledger.total_of(p_idx))
                .unwrap_or(root_total);
            let expected = parent_total * ratio;
            Some(ratio_check(actual, expected, tolerance.unwrap_or(DEFAULT_TOLERANCE)))
        }

        Constraint::EqualTo { node, tolerance, .. } => {
            let expected = ledger.total_of(program.index_of(node)?)?;
            let slack = expected.abs() * tolerance.unwrap_or(0.0) + EXACT_EPS;
            Some(ConstraintCheck {
                violated: (actual - expected).abs() > slack,
                expected,
                severity: Severity::Error,
                // The adjustment taxonomy is closed; snapping to an equal_to
                // target is a ratio-1.0 snap.
                kind: AdjustmentKind::ConstraintRatio,
            })
        }
    }
}

fn ratio_check(actual: f64, expected: f64, tolerance: f64) -> ConstraintCheck {
    let slack = expected.abs().max(EXACT_EPS) * tolerance;
    ConstraintCheck {
        violated: (actual - expected).abs() > slack,
        expected,
        severity: Severity::Warning,
        kind: AdjustmentKind::ConstraintRatio,
    }
}
