//! The area program data model: nodes, formulas, constraints, and the
//! indexed snapshot the engine evaluates against.

pub mod constraint;
pub mod formula;
pub mod node;
pub mod registry;

pub use constraint::{Constraint, DEFAULT_TOLERANCE};
pub use formula::{normalize_ratio, DeriveOp, FallbackMethod, Formula, Reference};
pub use node::{FormulaNode, NodeId, Origin, Provenance};
pub use registry::Program;
