//! Options accepted at the engine's function boundary.

use crate::program::NodeId;
use serde::{Deserialize, Serialize};

/// Which node receives the final rounding correction in single-absorber
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsorberPolicy {
    /// The largest single-unit computed node (fallback: largest overall).
    Largest,
    /// The unique remainder-typed node, when exactly one exists.
    Remainder,
    /// An explicitly named node.
    Node(NodeId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateOptions {
    /// Snap values violating auto-fixable constraints instead of only
    /// reporting them.
    pub auto_fix_constraints: bool,
    /// Reserved for future iterative reconciliation; accepted, unused.
    pub max_iterations: u32,
    /// Aggregate drift tolerated before reconciliation kicks in, and the
    /// tolerance used by the hierarchy audit. In area units.
    pub rounding_tolerance: f64,
    pub rounding_absorber: AbsorberPolicy,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            auto_fix_constraints: true,
            max_iterations: 10,
            rounding_tolerance: 1.0,
            rounding_absorber: AbsorberPolicy::Largest,
        }
    }
}
