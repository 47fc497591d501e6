//! Declarative constraints a node's computed total must respect. Checking
//! and auto-fixing live in `crate::validation`.

use super::node::NodeId;
use serde::{Deserialize, Serialize};

/// Relative tolerance applied to ratio-style constraints when none is declared.
pub const DEFAULT_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Computed total must not fall below `value`.
    Minimum {
        value: f64,
        #[serde(default)]
        reasoning: String,
    },
    /// Computed total must not exceed `value`.
    Maximum {
        value: f64,
        #[serde(default)]
        reasoning: String,
    },
    /// Computed total must be `ratio` times the named sibling's total,
    /// within `tolerance` (relative, default 5%).
    RatioToSibling {
        sibling: NodeId,
        ratio: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
        #[serde(default)]
        reasoning: String,
    },
    /// Computed total must be `ratio` times the parent's total, within
    /// `tolerance` (relative, default 5%).
    RatioToParent {
        ratio: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
        #[serde(default)]
        reasoning: String,
    },
    /// Computed total must equal the named node's total.
    EqualTo {
        node: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
        #[serde(default)]
        reasoning: String,
    },
}

impl Constraint {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constraint::Minimum { .. } => "minimum",
            Constraint::Maximum { .. } => "maximum",
            Constraint::RatioToSibling { .. } => "ratio_to_sibling",
            Constraint::RatioToParent { .. } => "ratio_to_parent",
            Constraint::EqualTo { .. } => "equal_to",
        }
    }

    /// Parent ratios may be authored as percentages just like ratio
    /// formulas are; the snapshot builder funnels constraints through here
    /// once. Sibling ratios are left untouched: "2" legitimately means
    /// twice the sibling, not 2%.
    pub(crate) fn normalized(mut self) -> Self {
        use super::formula::normalize_ratio;
        if let Constraint::RatioToParent { ratio, .. } = &mut self {
            *ratio = normalize_ratio(*ratio);
        }
        self
    }
}
