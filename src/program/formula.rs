//! The formula algebra: the closed set of rules that can derive a space's
//! area. A formula is declarative data; evaluation lives in `crate::eval`.

use super::node::NodeId;
use serde::{Deserialize, Serialize};

/// A symbolic pointer resolved to a numeric area during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reference {
    /// The declared root total. Always resolvable.
    Total,
    /// The node's computed parent total; falls back to the root total for
    /// root-level nodes (the fallback is recorded in the input trace).
    Parent,
    /// Sum of computed totals across nodes sharing the same parent.
    SiblingSum,
    /// An explicit node. Must already be computed when consumed.
    Node(NodeId),
}

/// Operation applied by a `Derived` formula to its source node's total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeriveOp {
    /// Multiply the source total by `value`.
    Ratio,
    /// Add `value` to the source total.
    Offset,
    /// Take the source total as-is; `value` is ignored.
    Copy,
}

/// Strategy used when there is not enough information for a precise rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMethod {
    /// Split the pool left over by non-fallback siblings among the fallback
    /// siblings, optionally weighted by each one's `suggested_ratio`.
    EqualShare,
    /// `root_total * suggested_ratio` (or a small default ratio).
    TypologyGuess,
    /// `minimum_area`, or the global absolute floor when unset.
    MinimumViable,
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_count() -> u32 {
    1
}

/// The rule deriving one space's area. Exactly one variant per node, and
/// every variant carries a human-readable `reasoning` string: the engine
/// never produces a number without an attached justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Formula {
    /// A fraction of a referenced area.
    Ratio {
        reference: Reference,
        ratio: f64,
        reasoning: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
    /// `area_per_unit * unit_count * multiplier`. Unit-count semantics are
    /// preserved end to end; the result is never collapsed into one blob.
    UnitBased {
        area_per_unit: f64,
        unit_count: u32,
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        reasoning: String,
    },
    /// Whatever is left of a parent pool after the (non-excluded) siblings.
    Remainder {
        parent_ref: Reference,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        floor: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cap: Option<f64>,
        #[serde(default)]
        exclude_siblings: Vec<NodeId>,
        reasoning: String,
    },
    /// A literal area, optionally repeated `count` times.
    Fixed {
        value: f64,
        #[serde(default = "default_count")]
        count: u32,
        reasoning: String,
        /// Informational at this layer: the UI refuses later edits.
        #[serde(default)]
        locked: bool,
    },
    /// Derived from another node's computed total.
    Derived {
        source: NodeId,
        operation: DeriveOp,
        value: f64,
        reasoning: String,
    },
    /// A share of a pool, expressed in counted shares.
    Distributed {
        pool_ref: Reference,
        share_count: f64,
        total_shares: f64,
        reasoning: String,
    },
    /// Used when information is missing; always surfaced to the user.
    Fallback {
        method: FallbackMethod,
        #[serde(default)]
        known_factors: Vec<String>,
        #[serde(default)]
        missing_info: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggested_ratio: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum_area: Option<f64>,
        confidence: f64,
        #[serde(default)]
        user_prompts: Vec<String>,
    },
}

/// Collapses the authored percentage-vs-ratio ambiguity once. Values above
/// 1 are read as percentages (`45` means 45%), so `45` and `0.45` evaluate
/// identically.
pub fn normalize_ratio(raw: f64) -> f64 {
    if raw > 1.0 {
        raw / 100.0
    } else {
        raw
    }
}

impl Formula {
    /// A short, stable label for warnings and descriptions.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Formula::Ratio { .. } => "ratio",
            Formula::UnitBased { .. } => "unit_based",
            Formula::Remainder { .. } => "remainder",
            Formula::Fixed { .. } => "fixed",
            Formula::Derived { .. } => "derived",
            Formula::Distributed { .. } => "distributed",
            Formula::Fallback { .. } => "fallback",
        }
    }

    /// The justification string carried by every variant.
    pub fn reasoning(&self) -> &str {
        match self {
            Formula::Ratio { reasoning, .. }
            | Formula::UnitBased { reasoning, .. }
            | Formula::Remainder { reasoning, .. }
            | Formula::Fixed { reasoning, .. }
            | Formula::Derived { reasoning, .. }
            | Formula::Distributed { reasoning, .. } => reasoning,
            Formula::Fallback { missing_info, .. } => {
                missing_info.first().map(String::as_str).unwrap_or("insufficient information")
            }
        }
    }

    /// Applies ratio normalization in the one place it is allowed to happen:
    /// when the engine builds its immutable program snapshot. Evaluators can
    /// then assume every ratio-like field is already in [0, 1].
    pub(crate) fn normalized(mut self) -> Self {
        match &mut self {
            Formula::Ratio { ratio, .. } => *ratio = normalize_ratio(*ratio),
            Formula::Fallback { suggested_ratio, .. } => {
                if let Some(r) = suggested_ratio {
                    *r = normalize_ratio(*r);
                }
            }
            _ => {}
        }
        self
    }

    /// Checks the numeric domain of the variant's fields. An `Err` marks the
    /// node malformed: it is skipped with a warning, never a crash.
    pub fn validate(&self) -> Result<(), String> {
        fn finite(v: f64, what: &str) -> Result<(), String> {
            if v.is_finite() {
                Ok(())
            } else {
                Err(format!("{what} is not a finite number"))
            }
        }

        match self {
            Formula::Ratio { ratio, .. } => {
                finite(*ratio, "ratio")?;
                if !(0.0..=1.0).contains(ratio) {
                    return Err(format!("ratio {ratio} is outside [0, 1] after normalization"));
                }
                Ok(())
            }
            Formula::UnitBased { area_per_unit, unit_count, multiplier, .. } => {
                finite(*area_per_unit, "area_per_unit")?;
                finite(*multiplier, "multiplier")?;
                if *area_per_unit < 0.0 {
                    return Err("area_per_unit is negative".into());
                }
                if *unit_count == 0 {
                    return Err("unit_count is zero".into());
                }
                if *multiplier <= 0.0 {
                    return Err("multiplier must be positive".into());
                }
                Ok(())
            }
            Formula::Remainder { floor, cap, .. } => {
                if let Some(f) = floor {
                    finite(*f, "floor")?;
                    if *f < 0.0 {
                        return Err("floor is negative".into());
                    }
                }
                if let Some(c) = cap {
                    finite(*c, "cap")?;
                    if *c < 0.0 {
                        return Err("cap is negative".into());
                    }
                }
                if let (Some(f), Some(c)) = (floor, cap) {
                    if c < f {
                        return Err(format!("cap {c} is below floor {f}"));
                    }
                }
                Ok(())
            }
            Formula::Fixed { value, count, .. } => {
                finite(*value, "value")?;
                if *value < 0.0 {
                    return Err("value is negative".into());
                }
                if *count == 0 {
                    return Err("count is zero".into());
                }
                Ok(())
            }
            Formula::Derived { operation, value, .. } => {
                finite(*value, "value")?;
                if matches!(operation, DeriveOp::Ratio) && *value < 0.0 {
                    return Err("ratio operand is negative".into());
                }
                Ok(())
            }
            Formula::Distributed { share_count, total_shares, .. } => {
                finite(*share_count, "share_count")?;
                finite(*total_shares, "total_shares")?;
                if *share_count < 0.0 {
                    return Err("share_count is negative".into());
                }
                if *total_shares <= 0.0 {
                    return Err("total_shares must be positive".into());
                }
                Ok(())
            }
            Formula::Fallback { suggested_ratio, minimum_area, confidence, .. } => {
                finite(*confidence, "confidence")?;
                if let Some(r) = suggested_ratio {
                    finite(*r, "suggested_ratio")?;
                    if *r < 0.0 {
                        return Err("suggested_ratio is negative".into());
                    }
                }
                if let Some(m) = minimum_area {
                    finite(*m, "minimum_area")?;
                    if *m < 0.0 {
                        return Err("minimum_area is negative".into());
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.45, 0.45)]
    #[case(45.0, 0.45)] // authored as a percentage
    #[case(1.0, 1.0)]
    #[case(100.0, 1.0)]
    #[case(0.0, 0.0)]
    fn ratio_normalization(#[case] raw: f64, #[case] expected: f64) {
        assert!((normalize_ratio(raw) - expected).abs() < 1e-12);
    }

    #[test]
    fn percentage_and_ratio_forms_normalize_identically() {
        let as_pct = Formula::Ratio {
            reference: Reference::Total,
            ratio: 45.0,
            reasoning: "test".into(),
            confidence: None,
        }
        .normalized();
        let as_ratio = Formula::Ratio {
            reference: Reference::Total,
            ratio: 0.45,
            reasoning: "test".into(),
            confidence: None,
        }
        .normalized();
        assert_eq!(as_pct, as_ratio);
    }

    #[test]
    fn validate_rejects_bad_numeric_domains() {
        let bad = Formula::Distributed {
            pool_ref: Reference::Total,
            share_count: 2.0,
            total_shares: 0.0,
            reasoning: "test".into(),
        };
        assert!(bad.validate().is_err());

        let bad = Formula::UnitBased {
            area_per_unit: 10.0,
            unit_count: 0,
            multiplier: 1.0,
            reasoning: "test".into(),
        };
        assert!(bad.validate().is_err());

        let bad = Formula::Ratio {
            reference: Reference::Parent,
            ratio: f64::NAN,
            reasoning: "test".into(),
            confidence: None,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn tagged_wire_shape_matches_collaborator_payloads() {
        let json = r#"{
            "kind": "ratio",
            "reference": "total",
            "ratio": 0.3,
            "reasoning": "lobbies run ~30% of gross"
        }"#;
        let f: Formula = serde_json::from_str(json).unwrap();
        assert_eq!(f.kind_name(), "ratio");

        let json = r#"{
            "kind": "fallback",
            "method": "minimum_viable",
            "missing_info": ["occupancy unknown"],
            "confidence": 0.2
        }"#;
        let f: Formula = serde_json::from_str(json).unwrap();
        match f {
            Formula::Fallback { method, minimum_area, .. } => {
                assert_eq!(method, FallbackMethod::MinimumViable);
                assert!(minimum_area.is_none());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }
}
