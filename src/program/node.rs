//! Defines `FormulaNode` and its identity/provenance types: one named space
//! in the building's area program, carrying the rule that derives its area.

use super::constraint::Constraint;
use super::formula::Formula;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique, stable identifier for a node within a program.
///
/// Ids are authored outside the engine (by the user or the planning
/// collaborator), so this is a string newtype rather than a dense index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Who authored a node. Collaborator-sourced nodes get no special trust;
/// the same validation and fallback machinery applies to both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Collaborator,
}

impl Default for Origin {
    fn default() -> Self {
        Origin::User
    }
}

/// Audit metadata for a node. The engine carries it through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default)]
    pub origin: Origin,
    /// Creation stamp as authored upstream (ISO-8601 text); opaque here.
    #[serde(default)]
    pub created_at: String,
}

/// One space in the area program.
///
/// Nodes are immutable during a single evaluation pass: the engine reads
/// them, never writes them. Hierarchy is optional and declared through
/// `parent` / `children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaNode {
    pub id: NodeId,
    pub name: String,
    pub formula: Formula,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub children: Vec<NodeId>,
    /// Free-text grouping hint ("public", "back of house", ...); opaque here.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub provenance: Provenance,
}

impl FormulaNode {
    /// Convenience constructor for the common flat case.
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, formula: Formula) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            formula,
            constraints: Vec::new(),
            parent: None,
            children: Vec::new(),
            group: None,
            provenance: Provenance::default(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
