//! Deterministic evaluation ordering.
//!
//! The formula algebra has no arbitrary expression DAG, so ordering reduces
//! to a static ranking of formula kinds: rules that describe "what's left"
//! (remainder, fallback) must run after the rules whose outputs they
//! subtract from or fill around. Ties keep declaration order.

use crate::program::{Formula, Program};

/// Lower runs earlier.
pub fn priority_class(formula: &Formula) -> u8 {
    match formula {
        Formula::Fixed { .. } => 0,
        Formula::UnitBased { .. } => 1,
        Formula::Derived { .. } => 2,
        Formula::Ratio { .. } => 3,
        Formula::Distributed { .. } => 4,
        Formula::Remainder { .. } => 5,
        Formula::Fallback { .. } => 6,
    }
}

/// Node indices in evaluation order: by priority class, stable on ties.
pub fn evaluation_order(program: &Program) -> Vec<usize> {
    let mut order: Vec<usize> = (0..program.len()).collect();
    order.sort_by_key(|&idx| priority_class(&program.node(idx).formula));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{FallbackMethod, FormulaNode, Reference};
    use rstest::rstest;

    fn node(id: &str, formula: Formula) -> FormulaNode {
        FormulaNode::new(id, id, formula)
    }

    fn ratio() -> Formula {
        Formula::Ratio { reference: Reference::Total, ratio: 0.1, reasoning: "t".into(), confidence: None }
    }

    fn fixed() -> Formula {
        Formula::Fixed { value: 10.0, count: 1, reasoning: "t".into(), locked: false }
    }

    fn remainder() -> Formula {
        Formula::Remainder {
            parent_ref: Reference::Parent,
            floor: None,
            cap: None,
            exclude_siblings: vec![],
            reasoning: "t".into(),
        }
    }

    #[rstest]
    #[case(fixed(), 0)]
    #[case(ratio(), 3)]
    #[case(remainder(), 5)]
    #[case(Formula::Fallback {
        method: FallbackMethod::EqualShare,
        known_factors: vec![],
        missing_info: vec![],
        suggested_ratio: None,
        minimum_area: None,
        confidence: 0.3,
        user_prompts: vec![],
    }, 6)]
    fn class_ranking(#[case] formula: Formula, #[case] expected: u8) {
        assert_eq!(priority_class(&formula), expected);
    }

    #[test]
    fn remainders_run_last_and_ties_keep_declaration_order() {
        let nodes = vec![
            node("leftover", remainder()),
            node("a", ratio()),
            node("base", fixed()),
            node("b", ratio()),
        ];
        let (program, _) = Program::from_nodes(&nodes);
        let order = evaluation_order(&program);
        // fixed first, then the two ratios in declaration order, remainder last
        assert_eq!(order, vec![2, 1, 3, 0]);
    }
}
