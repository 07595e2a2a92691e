//! Per-resource outcomes of a reclamation pass.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::classification::types::KeepReason;
use crate::runtime_client::types::{Resource, ResourceKey, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovedReason {
    Deleted,
    /// The runtime no longer knew the resource; counts as success.
    AlreadyGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    InUse,
    Running,
    Protected,
    Tagged,
    Excluded,
    /// The runtime refused the removal because something holds the resource.
    Busy,
    /// A resource referencing this one was not removed.
    Blocked,
    Timeout,
    DryRun,
}

impl From<KeepReason> for SkipReason {
    fn from(reason: KeepReason) -> Self {
        match reason {
            KeepReason::Excluded => SkipReason::Excluded,
            KeepReason::Running => SkipReason::Running,
            KeepReason::Protected => SkipReason::Protected,
            KeepReason::Tagged => SkipReason::Tagged,
            KeepReason::InUse => SkipReason::InUse,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    Removed(RemovedReason),
    Skipped(SkipReason),
    /// Raw runtime error message.
    Failed(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Removed(_) => "removed",
            Outcome::Skipped(_) => "skipped",
            Outcome::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Outcome::Removed(RemovedReason::Deleted) => "deleted".to_string(),
            Outcome::Removed(RemovedReason::AlreadyGone) => "already-gone".to_string(),
            Outcome::Skipped(reason) => match reason {
                SkipReason::InUse => "in-use",
                SkipReason::Running => "running",
                SkipReason::Protected => "protected",
                SkipReason::Tagged => "tagged",
                SkipReason::Excluded => "excluded",
                SkipReason::Busy => "busy",
                SkipReason::Blocked => "blocked",
                SkipReason::Timeout => "timeout",
                SkipReason::DryRun => "dry-run",
            }
            .to_string(),
            Outcome::Failed(message) => message.clone(),
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, Outcome::Removed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.reason())
    }
}

/// Final record for one snapshot resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReclaimResult {
    pub kind: ResourceKind,
    pub id: String,
    pub name: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub finished_at: DateTime<Utc>,
}

impl ReclaimResult {
    pub fn new(resource: &Resource, outcome: Outcome) -> Self {
        Self {
            kind: resource.kind,
            id: resource.id.clone(),
            name: resource.name.clone(),
            outcome,
            finished_at: Utc::now(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.kind, self.id.clone())
    }
}

/// Reclaimer state of a single resource.
///
/// `Pending -> Attempting -> {Removed, Skipped, Failed}`; resources that are
/// never attempted go straight from `Pending` to `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Attempting,
    Removed,
    Skipped,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Removed | Phase::Skipped | Phase::Failed)
    }
}

impl From<&Outcome> for Phase {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Removed(_) => Phase::Removed,
            Outcome::Skipped(_) => Phase::Skipped,
            Outcome::Failed(_) => Phase::Failed,
        }
    }
}

/// Knobs for a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReclaimOptions {
    /// Concurrent removals inside one tier.
    pub workers: usize,
    /// Deadline for dispatching removals, measured from the start of the pass.
    pub timeout: std::time::Duration,
    pub dry_run: bool,
}

impl Default for ReclaimOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout: std::time::Duration::from_secs(300),
            dry_run: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_client::types::ResourceState;

    #[test]
    fn reasons_render_as_codes() {
        assert_eq!(Outcome::Skipped(SkipReason::InUse).to_string(), "skipped: in-use");
        assert_eq!(Outcome::Skipped(SkipReason::Busy).reason(), "busy");
        assert_eq!(
            Outcome::Removed(RemovedReason::AlreadyGone).to_string(),
            "removed: already-gone"
        );
        assert_eq!(Outcome::Failed("boom".into()).to_string(), "failed: boom");
    }

    #[test]
    fn result_serializes_flat() {
        let resource = Resource::new(ResourceKind::Volume, "data", ResourceState::Dangling);
        let result = ReclaimResult::new(&resource, Outcome::Skipped(SkipReason::DryRun));
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["kind"], "volume");
        assert_eq!(json["id"], "data");
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "dry-run");
    }

    #[test]
    fn keep_reasons_map_to_skip_reasons() {
        assert_eq!(SkipReason::from(KeepReason::InUse), SkipReason::InUse);
        assert_eq!(SkipReason::from(KeepReason::Running), SkipReason::Running);
        assert_eq!(SkipReason::from(KeepReason::Excluded), SkipReason::Excluded);
    }

    #[test]
    fn phases_from_outcomes_are_terminal() {
        assert!(Phase::from(&Outcome::Failed("x".into())).is_terminal());
        assert!(!Phase::Attempting.is_terminal());
        assert!(!Phase::Pending.is_terminal());
    }
}
