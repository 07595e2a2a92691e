//! Garbage collector for container runtime resources.
//!
//! One pass takes a [`Snapshot`](runtime_client::Snapshot) of the runtime,
//! [classifies](classification::classify) what is dangling, removes it in
//! dependency order through a [`Reclaimer`](reclamation::Reclaimer) and
//! summarizes the outcome in a [`Report`](reporting::Report).

pub mod classification;
pub mod configuration;
pub mod error_handling;
pub mod reclamation;
pub mod reporting;
pub mod runtime_client;
