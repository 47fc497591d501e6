//! The immutable, indexed snapshot the engine evaluates against.
//!
//! Built once per evaluation call from the caller's node list: declaration
//! order is preserved, ids are mapped to dense indices, and parent/child/
//! sibling lookups are precomputed. Ratio normalization happens here and
//! nowhere else.

use super::node::{FormulaNode, NodeId};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Program {
    nodes: Vec<FormulaNode>,
    index: HashMap<NodeId, usize>,
    /// Child indices per node, merged from `parent` back-links and declared
    /// `children` lists, deduplicated in declaration order.
    children: Vec<Vec<usize>>,
}

impl Program {
    /// Indexes a node list. Later nodes reusing an already-seen id are
    /// dropped (first declaration wins); their ids are returned so the
    /// caller can surface a warning per duplicate.
    pub fn from_nodes(nodes: &[FormulaNode]) -> (Self, Vec<NodeId>) {
        let mut program = Program {
            nodes: Vec::with_capacity(nodes.len()),
            index: HashMap::with_capacity(nodes.len()),
            children: Vec::new(),
        };
        let mut duplicates = Vec::new();

        for node in nodes {
            if program.index.contains_key(&node.id) {
                duplicates.push(node.id.clone());
                continue;
            }
            let mut node = node.clone();
            node.formula = node.formula.normalized();
            node.constraints = node.constraints.drain(..).map(|c| c.normalized()).collect();
            program.index.insert(node.id.clone(), program.nodes.len());
            program.nodes.push(node);
        }

        program.children = vec![Vec::new(); program.nodes.len()];
        for (idx, node) in program.nodes.iter().enumerate() {
            if let Some(parent) = &node.parent {
                if let Some(&p_idx) = program.index.get(parent) {
                    program.children[p_idx].push(idx);
                }
            }
        }
        for (idx, node) in program.nodes.iter().enumerate() {
            for child in &node.children {
                if let Some(&c_idx) = program.index.get(child) {
                    if !program.children[idx].contains(&c_idx) {
                        program.children[idx].push(c_idx);
                    }
                }
            }
        }
        for kids in &mut program.children {
            kids.sort_unstable();
        }

        (program, duplicates)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, idx: usize) -> &FormulaNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[FormulaNode] {
        &self.nodes
    }

    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn children_of(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }

    /// Indices of nodes sharing this node's parent (root-level nodes are
    /// siblings of each other), excluding the node itself.
    pub fn siblings_of(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let parent = self.nodes[idx].parent.clone();
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(j, n)| *j != idx && n.parent == parent)
            .map(|(j, _)| j)
    }

    /// Whether any parent/child relationship is declared. Drives the
    /// reconciliation strategy choice.
    pub fn has_hierarchy(&self) -> bool {
        self.nodes.iter().any(|n| n.parent.is_some() || !n.children.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::formula::{Formula, Reference};

    fn ratio_node(id: &str, ratio: f64) -> FormulaNode {
        FormulaNode::new(
            id,
            id.to_uppercase(),
            Formula::Ratio { reference: Reference::Total, ratio, reasoning: "t".into(), confidence: None },
        )
    }

    #[test]
    fn duplicate_ids_keep_first_declaration() {
        let nodes = vec![ratio_node("a", 0.5), ratio_node("a", 0.2), ratio_node("b", 0.3)];
        let (program, dups) = Program::from_nodes(&nodes);
        assert_eq!(program.len(), 2);
        assert_eq!(dups, vec![NodeId::from("a")]);
        match &program.node(0).formula {
            Formula::Ratio { ratio, .. } => assert!((ratio - 0.5).abs() < 1e-12),
            other => panic!("wrong formula: {other:?}"),
        }
    }

    #[test]
    fn normalization_happens_at_snapshot_build() {
        let nodes = vec![ratio_node("a", 45.0)];
        let (program, _) = Program::from_nodes(&nodes);
        match &program.node(0).formula {
            Formula::Ratio { ratio, .. } => assert!((ratio - 0.45).abs() < 1e-12),
            other => panic!("wrong formula: {other:?}"),
        }
    }

    #[test]
    fn children_merge_back_links_and_declared_lists() {
        let mut root = ratio_node("root", 1.0);
        root.children = vec![NodeId::from("a")]; // declared list
        let a = ratio_node("a", 0.5).with_parent("root");
        let b = ratio_node("b", 0.5).with_parent("root"); // back-link only
        let (program, _) = Program::from_nodes(&[root, a, b]);

        let root_idx = program.index_of(&NodeId::from("root")).unwrap();
        assert_eq!(program.children_of(root_idx), &[1, 2]);
        assert!(program.has_hierarchy());

        let a_idx = program.index_of(&NodeId::from("a")).unwrap();
        let sibs: Vec<usize> = program.siblings_of(a_idx).collect();
        assert_eq!(sibs, vec![2]);
    }
}
