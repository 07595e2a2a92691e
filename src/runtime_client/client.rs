use async_trait::async_trait;

use super::types::{Resource, ResourceKind};
use crate::error_handling::types::RuntimeError;

/// The list/remove primitives the collector needs from a container runtime.
///
/// Implementations must not retry: every failure is returned as-is so the
/// reclaimer can decide what it means for the resource.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Checks that the runtime answers at all.
    async fn ping(&self) -> Result<(), RuntimeError>;

    /// Lists every resource of `kind` with its outgoing references.
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, RuntimeError>;

    /// Removes one resource. Fails with `ResourceBusy` while something still
    /// holds it and with `NotFound` when it is already gone.
    async fn remove(&self, kind: ResourceKind, id: &str) -> Result<(), RuntimeError>;
}
