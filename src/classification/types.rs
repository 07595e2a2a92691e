//! Types produced by the classifier.

use serde::Serialize;
use std::fmt;

use crate::runtime_client::types::ResourceKind;

/// Why a resource is kept out of the removal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeepReason {
    /// Its kind is not eligible in this pass.
    Excluded,
    Running,
    /// Name is on the protected list (default runtime networks).
    Protected,
    /// Image with at least one repository tag.
    Tagged,
    /// Still referenced by a live resource or by something outside the snapshot.
    InUse,
}

impl KeepReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeepReason::Excluded => "excluded",
            KeepReason::Running => "running",
            KeepReason::Protected => "protected",
            KeepReason::Tagged => "tagged",
            KeepReason::InUse => "in-use",
        }
    }
}

impl fmt::Display for KeepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Dangling,
    Keep(KeepReason),
}

impl Verdict {
    pub fn is_dangling(&self) -> bool {
        matches!(self, Verdict::Dangling)
    }
}

/// Which resources may be classified as dangling at all.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierPolicy {
    pub kinds: Vec<ResourceKind>,
    pub keep_tagged_images: bool,
    pub protected_networks: Vec<String>,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            kinds: ResourceKind::ALL.to_vec(),
            keep_tagged_images: true,
            protected_networks: ["bridge", "host", "none", "podman"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Verdict for every resource of a snapshot, indexed by snapshot position.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub(crate) verdicts: Vec<Verdict>,
    pub(crate) rounds: usize,
}

impl Classification {
    pub fn verdict(&self, position: usize) -> Verdict {
        self.verdicts[position]
    }

    pub fn verdicts(&self) -> &[Verdict] {
        &self.verdicts
    }

    pub fn is_dangling(&self, position: usize) -> bool {
        self.verdicts[position].is_dangling()
    }

    /// Snapshot positions of every dangling resource, ascending.
    pub fn dangling(&self) -> Vec<usize> {
        self.verdicts
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_dangling())
            .map(|(position, _)| position)
            .collect()
    }

    pub fn dangling_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_dangling()).count()
    }

    /// Fixed-point rounds it took to settle; never more than the resource count + 1.
    pub fn rounds(&self) -> usize {
        self.rounds
    }
}
