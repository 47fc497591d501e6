//! ledger.rs
//! Append-only store of per-node computed values, threaded explicitly
//! through evaluation so the dependency on computation order is visible in
//! function signatures rather than hidden in a shared mutable map.

use crate::program::{Formula, NodeId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub use self::error::EvalError;
mod error {
    use super::*;
    use thiserror::Error;

    /// A node-local evaluation failure. Never escapes the public entry
    /// point: the failing node is excluded and the failure becomes a
    /// warning on the run result.
    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum EvalError {
        #[error("node '{node}' references '{reference}', which is not computed yet")]
        UnresolvedReference { node: NodeId, reference: NodeId },
        #[error("node '{node}' references unknown node '{reference}'")]
        UnknownNode { node: NodeId, reference: NodeId },
        #[error("derived node '{node}' has no computed source '{source_id}'")]
        MissingDerivedSource { node: NodeId, source_id: NodeId },
        #[error("node '{node}' has a malformed formula: {detail}")]
        MalformedFormula { node: NodeId, detail: String },
    }
}

/// One named numeric input consumed while evaluating a node, in the order
/// it was consumed. Reference fallbacks are named explicitly here so they
/// stay auditable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTrace {
    pub name: String,
    pub value: f64,
}

impl InputTrace {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    ConstraintMin,
    ConstraintMax,
    ConstraintRatio,
    Rounding,
}

/// Records one correction applied to a node's raw computed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationAdjustment {
    pub kind: AdjustmentKind,
    pub original: f64,
    pub adjusted: f64,
    pub reason: String,
}

/// The engine's output for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedValue {
    pub area_per_unit: f64,
    pub count: u32,
    /// `area_per_unit * count`, kept in lockstep by every adjustment.
    pub total_area: f64,
    pub inputs: SmallVec<[InputTrace; 4]>,
    pub adjustments: SmallVec<[EvaluationAdjustment; 2]>,
    /// Snapshot of the (normalized) formula that produced this value.
    pub formula: Formula,
    /// One-line human-readable account of the computation.
    pub description: String,
}

impl ComputedValue {
    /// Replaces the total, keeping `area_per_unit * count == total_area`.
    pub fn set_total(&mut self, total: f64) {
        self.total_area = total;
        self.area_per_unit = total / f64::from(self.count.max(1));
    }
}

/// Dense, append-only storage of computed values, indexed by the program's
/// declaration order. A `None` slot is a node that was skipped or failed
/// locally.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    values: Vec<Option<ComputedValue>>,
}

impl Ledger {
    pub fn with_capacity(size: usize) -> Self {
        Self { values: vec![None; size] }
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&ComputedValue> {
        self.values.get(idx)?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut ComputedValue> {
        self.values.get_mut(idx)?.as_mut()
    }

    #[inline]
    pub fn total_of(&self, idx: usize) -> Option<f64> {
        self.get(idx).map(|v| v.total_area)
    }

    pub fn insert(&mut self, idx: usize, value: ComputedValue) {
        if idx >= self.values.len() {
            self.values.resize(idx + 1, None);
        }
        self.values[idx] = Some(value);
    }

    /// Computed slots in declaration order; iteration order is what makes
    /// the whole engine deterministic, so nothing ever iterates a hash map.
    pub fn iter_computed(&self) -> impl Iterator<Item = (usize, &ComputedValue)> {
        self.values.iter().enumerate().filter_map(|(i, v)| v.as_ref().map(|cv| (i, cv)))
    }

    /// Sum of all computed totals so far.
    pub fn sum_total(&self) -> f64 {
        self.iter_computed().map(|(_, v)| v.total_area).sum()
    }
}
