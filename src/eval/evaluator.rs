//! Per-node formula evaluation: one pure function per variant. Callers
//! decide whether to store the result; nothing here mutates the ledger.

use super::ledger::{EvalError, InputTrace, Ledger};
use super::resolver::resolve;
use crate::program::{DeriveOp, FallbackMethod, Formula, Program, Reference};
use crate::sizing::{DEFAULT_TYPOLOGY_RATIO, MIN_AREA_ABSOLUTE};
use smallvec::SmallVec;

/// A raw computed value, before constraint checking and reconciliation.
#[derive(Debug)]
pub struct RawComputed {
    pub area_per_unit: f64,
    pub count: u32,
    pub total: f64,
    pub inputs: SmallVec<[InputTrace; 4]>,
}

impl RawComputed {
    fn single(total: f64, inputs: SmallVec<[InputTrace; 4]>) -> Self {
        Self { area_per_unit: total, count: 1, total, inputs }
    }
}

/// Evaluates the formula of the node at `idx` against the computed values
/// accumulated so far. A formula failing numeric-domain validation is
/// rejected here with a typed error, before any reference is resolved.
///
/// Totals derived from resolved references are rounded to the nearest whole
/// area unit (the per-node rounding whose accumulated drift the reconciler
/// closes afterwards). `fixed` and `unit_based` totals are exact products
/// of authored numbers and are left untouched.
pub fn evaluate_node(
    idx: usize,
    program: &Program,
    ledger: &Ledger,
    root_total: f64,
) -> Result<RawComputed, EvalError> {
    let node = program.node(idx);
    node.formula.validate().map_err(|detail| EvalError::MalformedFormula {
        node: node.id.clone(),
        detail,
    })?;
    match &node.formula {
        Formula::Fixed { value, count, .. } => {
            let mut inputs = SmallVec::new();
            inputs.push(InputTrace::new("fixed value", *value));
            if *count != 1 {
                inputs.push(InputTrace::new("count", f64::from(*count)));
            }
            Ok(RawComputed {
                area_per_unit: *value,
                count: *count,
                total: value * f64::from(*count),
                inputs,
            })
        }

        Formula::UnitBased { area_per_unit, unit_count, multiplier, .. } => {
            let mut inputs = SmallVec::new();
            inputs.push(InputTrace::new("area per unit", *area_per_unit));
            inputs.push(InputTrace::new("unit count", f64::from(*unit_count)));
            if (*multiplier - 1.0).abs() > f64::EPSILON {
                inputs.push(InputTrace::new("multiplier", *multiplier));
            }
            let total = area_per_unit * f64::from(*unit_count) * multiplier;
            Ok(RawComputed {
                area_per_unit: area_per_unit * multiplier,
                count: *unit_count,
                total,
                inputs,
            })
        }

        Formula::Ratio { reference, ratio, .. } => {
            let mut base = resolve(reference, idx, program, ledger, root_total)?;
            base.inputs.push(InputTrace::new("ratio", *ratio));
            let total = (base.value * ratio).round();
            Ok(RawComputed::single(total, base.inputs))
        }

        Formula::Remainder { parent_ref, floor, cap, exclude_siblings, .. } => {
            let mut pool = resolve(parent_ref, idx, program, ledger, root_total)?;

            let mut used = 0.0;
            for sib_idx in program.siblings_of(idx) {
                if exclude_siblings.contains(&program.node(sib_idx).id) {
                    continue;
                }
                if let Some(total) = ledger.total_of(sib_idx) {
                    used += total;
                }
            }
            pool.inputs.push(InputTrace::new("siblings used", used));

            let mut total = (pool.value - used).max(0.0);
            if let Some(c) = cap {
                if total > *c {
                    total = *c;
                    pool.inputs.push(InputTrace::new("cap", *c));
                }
            }
            if let Some(f) = floor {
                // Raise to the floor only when the aggregate stays within
                // the declared total; otherwise leave the shortfall to the
                // reconciler, which runs last and is authoritative.
                if total < *f && ledger.sum_total() + f <= root_total + 1e-9 {
                    total = *f;
                    pool.inputs.push(InputTrace::new("floor", *f));
                }
            }
            Ok(RawComputed::single(total.round(), pool.inputs))
        }

        Formula::Derived { source, operation, value, .. } => {
            let source_idx = program.index_of(source).ok_or_else(|| EvalError::UnknownNode {
                node: node.id.clone(),
                reference: source.clone(),
            })?;
            let source_total =
                ledger.total_of(source_idx).ok_or_else(|| EvalError::MissingDerivedSource {
                    node: node.id.clone(),
                    source_id: source.clone(),
                })?;

            let mut inputs: SmallVec<[InputTrace; 4]> = SmallVec::new();
            inputs.push(InputTrace::new(format!("source '{source}'"), source_total));
            let total = match operation {
                DeriveOp::Ratio => {
                    inputs.push(InputTrace::new("ratio", *value));
                    source_total * value
                }
                DeriveOp::Offset => {
                    inputs.push(InputTrace::new("offset", *value));
                    source_total + value
                }
                DeriveOp::Copy => source_total,
            };
            Ok(RawComputed::single(total.round(), inputs))
        }

        Formula::Distributed { pool_ref, share_count, total_shares, .. } => {
            let mut pool = resolve(pool_ref, idx, program, ledger, root_total)?;
            pool.inputs.push(InputTrace::new("share count", *share_count));
            pool.inputs.push(InputTrace::new("total shares", *total_shares));
            let total = (pool.value * (share_count / total_shares)).round();
            Ok(RawComputed::single(total, pool.inputs))
        }

        Formula::Fallback { method, suggested_ratio, minimum_area, .. } => {
            evaluate_fallback(idx, program, ledger, root_total, *method, *suggested_ratio, *minimum_area)
        }
    }
}

fn evaluate_fallback(
    idx: usize,
    program: &Program,
    ledger: &Ledger,
    root_total: f64,
    method: FallbackMethod,
    suggested_ratio: Option<f64>,
    minimum_area: Option<f64>,
) -> Result<RawComputed, EvalError> {
    let (total, mut inputs) = match method {
        FallbackMethod::EqualShare => {
            // Pool left after the non-fallback siblings, split across the
            // fallback siblings (self included) by suggested-ratio weight.
            let mut pool = resolve(&Reference::Parent, idx, program, ledger, root_total)?;

            let mut non_fallback_used = 0.0;
            let mut weight_sum = fallback_weight(suggested_ratio);
            for sib_idx in program.siblings_of(idx) {
                match &program.node(sib_idx).formula {
                    Formula::Fallback { suggested_ratio, .. } => {
                        weight_sum += fallback_weight(*suggested_ratio);
                    }
                    _ => {
                        if let Some(total) = ledger.total_of(sib_idx) {
                            non_fallback_used += total;
                        }
                    }
                }
            }

            let remaining = (pool.value - non_fallback_used).max(0.0);
            pool.inputs.push(InputTrace::new("pool remaining", remaining));
            let weight = fallback_weight(suggested_ratio);
            if (weight - 1.0).abs() > f64::EPSILON {
                pool.inputs.push(InputTrace::new("weight", weight));
            }
            (remaining * weight / weight_sum, pool.inputs)
        }

        FallbackMethod::TypologyGuess => {
            let ratio = suggested_ratio.unwrap_or(DEFAULT_TYPOLOGY_RATIO);
            let mut inputs: SmallVec<[InputTrace; 4]> = SmallVec::new();
            inputs.push(InputTrace::new("total", root_total));
            inputs.push(InputTrace::new("typology ratio", ratio));
            (root_total * ratio, inputs)
        }

        FallbackMethod::MinimumViable => {
            let area = minimum_area.unwrap_or(MIN_AREA_ABSOLUTE);
            let mut inputs: SmallVec<[InputTrace; 4]> = SmallVec::new();
            inputs.push(InputTrace::new("minimum viable area", area));
            (area, inputs)
        }
    };

    let mut total = total.round();
    if total < MIN_AREA_ABSOLUTE {
        total = MIN_AREA_ABSOLUTE;
        inputs.push(InputTrace::new("absolute minimum", MIN_AREA_ABSOLUTE));
    }
    Ok(RawComputed::single(total, inputs))
}

fn fallback_weight(suggested_ratio: Option<f64>) -> f64 {
    match suggested_ratio {
        Some(r) if r > 0.0 => r,
        _ => 1.0,
    }
}
