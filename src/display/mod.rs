//! Human-readable rendering of computed values.

pub mod describe;

pub use describe::{describe, format_trace};
