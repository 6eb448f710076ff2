//! Row validation engine.
//!
//! Provides message/status types and a pure-logic evaluator that checks the
//! mapped values of one row against per-field format rules.

pub mod evaluator;
pub mod rules;

pub use evaluator::validate_mapped;
pub use rules::{RowMessage, RowStatus, Severity};
