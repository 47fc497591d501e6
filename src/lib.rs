//! Formula evaluation engine for building area programs.
//!
//! A program is an ordered list of [`FormulaNode`]s: named spaces whose
//! areas are described symbolically (ratios of a pool, unit counts,
//! remainders, derivations from other spaces, or explicit fallbacks when
//! information is missing). [`evaluate`] turns that description plus a
//! target total into concrete, internally consistent areas: nodes are
//! scheduled so dependencies come first, each value is checked against its
//! declared constraints (and optionally snapped into compliance), rounding
//! drift is reconciled back to the target, and parent/child totals are
//! audited.
//!
//! The engine is pure and synchronous: no I/O, no retained state, no
//! panics out of the public entry point. Every failure mode degrades to a
//! structured part of [`TreeEvaluationResult`].
//!
//! ```
//! use spaceplan_core::{evaluate, EvaluateOptions, Formula, FormulaNode, Reference};
//!
//! let nodes = vec![
//!     FormulaNode::new("lobby", "Lobby", Formula::Ratio {
//!         reference: Reference::Total,
//!         ratio: 0.4,
//!         reasoning: "generous entry sequence".into(),
//!         confidence: None,
//!     }),
//!     FormulaNode::new("hall", "Main hall", Formula::Remainder {
//!         parent_ref: Reference::Total,
//!         floor: None,
//!         cap: None,
//!         exclude_siblings: vec![],
//!         reasoning: "takes whatever the lobby leaves".into(),
//!     }),
//! ];
//! let result = evaluate(&nodes, 1000.0, &EvaluateOptions::default());
//! assert!(result.success);
//! assert_eq!(result.total_area, 1000.0);
//! ```

pub mod display;
pub mod eval;
pub mod program;
pub mod sizing;
pub mod validation;

pub use display::{describe, format_trace};
pub use eval::{
    evaluate, AbsorberPolicy, AdjustmentKind, ComputedValue, ConstraintViolation, EvalError,
    EvaluateOptions, EvaluationAdjustment, EvaluationWarning, HierarchyMismatch, InputTrace,
    Severity, TreeEvaluationResult, WarningKind,
};
pub use program::{
    Constraint, DeriveOp, FallbackMethod, Formula, FormulaNode, NodeId, Origin, Program,
    Provenance, Reference,
};
pub use sizing::{can_split_area, minimum_area_for, SplitFeasibility};
