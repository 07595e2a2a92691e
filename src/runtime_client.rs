//! Runtime client subsystem.
//!
//! This module is the only place that talks to the container runtime. It
//! exposes the list/remove primitives behind the [`RuntimeClient`] trait and
//! builds the immutable [`Snapshot`] a pass works on.
//!
//! Re-exports:
//! - [`RuntimeClient`]: list/remove contract.
//! - [`CliRuntime`]: implementation over the `docker`/`podman` command line.
//! - [`Snapshot`]: normalized point-in-time view of the runtime.
//! - [`Resource`], [`ResourceKey`], [`ResourceKind`], [`ResourceState`]: core types.
//!
//! Example (non-running):
//! ```ignore
//! use reclaim::runtime_client::{CliRuntime, Snapshot};
//!
//! let runtime = CliRuntime::new("docker");
//! let snapshot = Snapshot::capture(&runtime).await?;
//! println!("{} resources", snapshot.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli_runtime;
pub mod client;
#[cfg(test)]
pub mod memory_runtime;
pub mod snapshot;
pub mod types;

pub use cli_runtime::CliRuntime;
pub use client::RuntimeClient;
pub use snapshot::Snapshot;
pub use types::{Resource, ResourceKey, ResourceKind, ResourceState};
