//! Constraint checking/auto-fixing and hierarchy auditing.

pub mod constraints;
pub mod hierarchy;
