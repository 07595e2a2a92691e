//! Dangling-resource classification.
//!
//! Pure reference counting over a [`Snapshot`](crate::runtime_client::Snapshot);
//! nothing in here talks to the runtime.

pub mod classifier;
pub mod types;

pub use classifier::classify;
pub use types::{Classification, ClassifierPolicy, KeepReason, Verdict};
