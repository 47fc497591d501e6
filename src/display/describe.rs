//! Human-readable rendering: the one-line description stored on every
//! computed value, and an indented audit trace for UI/debug surfaces.

use crate::eval::ledger::{AdjustmentKind, Ledger};
use crate::program::{DeriveOp, FallbackMethod, Formula, NodeId, Program, Reference};
use std::fmt::Write;

fn reference_label(reference: &Reference) -> String {
    match reference {
        Reference::Total => "total".to_string(),
        Reference::Parent => "parent".to_string(),
        Reference::SiblingSum => "sibling sum".to_string(),
        Reference::Node(id) => format!("'{id}'"),
    }
}

fn fmt_area(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        format!("{v:.1}")
    }
}

/// One-line account of how a total came to be, e.g.
/// `"45% of total = 450"` or `"8 per unit x 10 units = 80"`.
pub fn describe(formula: &Formula, total: f64) -> String {
    let rule = match formula {
        Formula::Ratio { reference, ratio, .. } => {
            format!("{:.0}% of {}", ratio * 100.0, reference_label(reference))
        }
        Formula::UnitBased { area_per_unit, unit_count, multiplier, .. } => {
            let mut s = format!("{} per unit x {} units", fmt_area(*area_per_unit), unit_count);
            if (multiplier - 1.0).abs() > f64::EPSILON {
                let _ = write!(s, " x {multiplier:.2}");
            }
            s
        }
        Formula::Remainder { parent_ref, .. } => {
            format!("remainder of {} after siblings", reference_label(parent_ref))
        }
        Formula::Fixed { value, count, .. } => {
            if *count == 1 {
                format!("fixed {}", fmt_area(*value))
            } else {
                format!("fixed {} x {}", fmt_area(*value), count)
            }
        }
        Formula::Derived { source, operation, value, .. } => match operation {
            DeriveOp::Ratio => format!("{:.0}% of '{}'", value * 100.0, source),
            DeriveOp::Offset => format!("'{}' {} {}", source, if *value < 0.0 { "-" } else { "+" }, fmt_area(value.abs())),
            DeriveOp::Copy => format!("copy of '{source}'"),
        },
        Formula::Distributed { pool_ref, share_count, total_shares, .. } => {
            format!("{}/{} shares of {}", share_count, total_shares, reference_label(pool_ref))
        }
        Formula::Fallback { method, .. } => {
            let label = match method {
                FallbackMethod::EqualShare => "equal share",
                FallbackMethod::TypologyGuess => "typology guess",
                FallbackMethod::MinimumViable => "minimum viable",
            };
            format!("fallback ({label})")
        }
    };
    format!("{} = {}", rule, fmt_area(total))
}

/// Full indented audit trace for one node: inputs in the order they were
/// consumed, adjustments with before/after values, and the formula's
/// reasoning.
pub fn format_trace(program: &Program, ledger: &Ledger, target: &NodeId) -> String {
    let mut output = String::new();

    let Some(idx) = program.index_of(target) else {
        let _ = writeln!(output, "Error: unknown node '{target}'");
        return output;
    };
    let node = program.node(idx);
    let _ = writeln!(output, "AUDIT TRACE for node '{}':", node.name);
    let _ = writeln!(output, "--------------------------------------------------");

    let Some(value) = ledger.get(idx) else {
        let _ = writeln!(output, "{} -> excluded from evaluation", node.name);
        return output;
    };

    let _ = writeln!(output, "{} [{}] = {}", node.name, fmt_area(value.total_area), value.description);
    for input in &value.inputs {
        let _ = writeln!(output, "|-- {} [{:.3}]", input.name, input.value);
    }
    for adj in &value.adjustments {
        let kind = match adj.kind {
            AdjustmentKind::ConstraintMin => "min constraint",
            AdjustmentKind::ConstraintMax => "max constraint",
            AdjustmentKind::ConstraintRatio => "ratio constraint",
            AdjustmentKind::Rounding => "rounding",
        };
        let _ = writeln!(
            output,
            "|-- adjusted ({kind}): {} -> {} ({})",
            fmt_area(adj.original),
            fmt_area(adj.adjusted),
            adj.reason
        );
    }
    let _ = writeln!(output, "`-- reasoning: {}", node.formula.reasoning());
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Formula::Ratio {
        reference: Reference::Total,
        ratio: 0.45,
        reasoning: "t".into(),
        confidence: None,
    }, 450.0, "45% of total = 450")]
    #[case(Formula::Fixed { value: 12.0, count: 4, reasoning: "t".into(), locked: false },
        48.0, "fixed 12 x 4 = 48")]
    #[case(Formula::UnitBased { area_per_unit: 8.0, unit_count: 10, multiplier: 1.0, reasoning: "t".into() },
        80.0, "8 per unit x 10 units = 80")]
    #[case(Formula::Fallback {
        method: FallbackMethod::MinimumViable,
        known_factors: vec![],
        missing_info: vec![],
        suggested_ratio: None,
        minimum_area: None,
        confidence: 0.2,
        user_prompts: vec![],
    }, 2.0, "fallback (minimum viable) = 2")]
    fn one_line_descriptions(#[case] formula: Formula, #[case] total: f64, #[case] expected: &str) {
        assert_eq!(describe(&formula, total), expected);
    }

    #[test]
    fn trace_lists_inputs_adjustments_and_reasoning() {
        use crate::eval::{evaluate, EvaluateOptions};
        use crate::program::{Constraint, FormulaNode, Program};

        let node = FormulaNode::new(
            "studio",
            "Studio",
            Formula::Ratio {
                reference: Reference::Total,
                ratio: 0.84,
                reasoning: "sized from the daylight study".into(),
                confidence: None,
            },
        )
        .with_constraint(Constraint::Minimum { value: 500.0, reasoning: "brief".into() });

        // evaluate for real, then rebuild the same snapshot/ledger shape
        let result = evaluate(std::slice::from_ref(&node), 500.0, &EvaluateOptions::default());
        let (program, _) = Program::from_nodes(std::slice::from_ref(&node));
        let mut ledger = crate::eval::Ledger::with_capacity(1);
        ledger.insert(0, result.computed[&NodeId::from("studio")].clone());

        let trace = format_trace(&program, &ledger, &NodeId::from("studio"));
        assert!(trace.contains("AUDIT TRACE for node 'Studio'"));
        assert!(trace.contains("total [500.000]"));
        assert!(trace.contains("min constraint"));
        assert!(trace.contains("daylight study"));

        let missing = format_trace(&program, &ledger, &NodeId::from("ghost"));
        assert!(missing.contains("unknown node"));
    }
}
