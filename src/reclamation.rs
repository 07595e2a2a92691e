//! Reclamation subsystem.
//!
//! Turns a classified snapshot into one [`ReclaimResult`] per resource:
//! - `tiers`: topological removal order over the dangling sub-graph.
//! - `ledger`: per-resource state machine and result collection.
//! - `reclaimer`: tiered, bounded-concurrency removal against a runtime.
//! - `types`: outcomes, reason codes and pass options.

pub mod ledger;
pub mod reclaimer;
pub mod tiers;
pub mod types;

pub use reclaimer::{Pass, Reclaimer};
pub use types::{Outcome, Phase, ReclaimOptions, ReclaimResult, RemovedReason, SkipReason};
