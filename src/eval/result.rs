//! Structured result types returned from the engine's entry point. Every
//! failure mode in the taxonomy degrades to an inspectable value here;
//! nothing escapes `evaluate` as a panic.

use super::ledger::ComputedValue;
use crate::program::{Constraint, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Reported; if left unfixed, flips the run's `success` to false.
    Error,
    /// Reported only; never affects `success`.
    Warning,
}

/// A constraint the computed value did not satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub node_id: NodeId,
    pub constraint: Constraint,
    pub expected: f64,
    pub actual: f64,
    pub severity: Severity,
    /// Whether the engine could have snapped the value itself (it does so
    /// when `auto_fix_constraints` is on; fixed violations are recorded as
    /// adjustments instead of appearing here).
    pub auto_fixable: bool,
}

/// The category of a run-level warning. Typed so callers can filter
/// programmatically instead of string-matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A formula failed numeric-domain validation; the node was skipped.
    MalformedNode,
    /// An explicit reference pointed at a missing or uncomputed node; the
    /// referencing node was excluded locally.
    UnresolvedReference,
    /// A later node reused an id; the later declaration was dropped.
    DuplicateNode,
    /// A fallback formula ran. Informational, but never silent.
    FallbackUsed,
    /// The call itself was unusable (e.g. non-positive target total).
    InvalidInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationWarning {
    pub node_id: Option<NodeId>,
    pub kind: WarningKind,
    pub message: String,
}

impl EvaluationWarning {
    pub fn for_node(id: &NodeId, kind: WarningKind, message: impl Into<String>) -> Self {
        Self { node_id: Some(id.clone()), kind, message: message.into() }
    }

    pub fn global(kind: WarningKind, message: impl Into<String>) -> Self {
        Self { node_id: None, kind, message: message.into() }
    }
}

/// A parent whose computed total disagrees with the sum of its children.
/// Reported, never auto-corrected: mid-edit programs are legitimately
/// inconsistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyMismatch {
    pub parent_id: NodeId,
    pub parent_total: f64,
    pub children_sum: f64,
    pub difference: f64,
}

/// The engine's complete answer for one evaluation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEvaluationResult {
    /// False iff an unfixed `Error`-severity violation remains, or the
    /// input itself was unusable.
    pub success: bool,
    pub computed: BTreeMap<NodeId, ComputedValue>,
    /// Aggregate of all computed totals, post-reconciliation.
    pub total_area: f64,
    pub violations: Vec<ConstraintViolation>,
    pub warnings: Vec<EvaluationWarning>,
    pub hierarchy_valid: bool,
    pub hierarchy_errors: Vec<HierarchyMismatch>,
}

impl TreeEvaluationResult {
    pub(crate) fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            computed: BTreeMap::new(),
            total_area: 0.0,
            violations: Vec::new(),
            warnings: vec![EvaluationWarning::global(WarningKind::InvalidInput, message)],
            hierarchy_valid: true,
            hierarchy_errors: Vec::new(),
        }
    }
}
