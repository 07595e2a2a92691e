//! Error types shared across the collector.

pub mod types;

pub use types::{ConfigError, ReclaimError, RuntimeError};
