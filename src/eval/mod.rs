//! The evaluation engine: scheduling, reference resolution, per-node
//! evaluation, constraint-aware value storage, rounding reconciliation,
//! and the orchestrator that composes them.

pub mod engine;
pub mod evaluator;
pub mod ledger;
pub mod options;
pub mod reconcile;
pub mod resolver;
pub mod result;
pub mod scheduler;

pub use engine::evaluate;
pub use ledger::{AdjustmentKind, ComputedValue, EvalError, EvaluationAdjustment, InputTrace, Ledger};
pub use options::{AbsorberPolicy, EvaluateOptions};
pub use result::{
    ConstraintViolation, EvaluationWarning, HierarchyMismatch, Severity, TreeEvaluationResult,
    WarningKind,
};
