//! Operator-facing summary of a pass.

pub mod report;

pub use report::{OutcomeCounts, Report};
