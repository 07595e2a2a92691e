use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::reclamation::types::{Outcome, ReclaimResult};
use crate::runtime_client::types::ResourceKind;

/// Outcome counters for one resource kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Removed(_) => self.removed += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.removed + self.skipped + self.failed
    }
}

/// Aggregated view of a pass for operators.
///
/// Built purely from the results; rendering it has no side effects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub by_kind: BTreeMap<ResourceKind, OutcomeCounts>,
    pub totals: OutcomeCounts,
    pub entries: Vec<ReclaimResult>,
}

impl Report {
    pub fn from_results(results: &[ReclaimResult]) -> Self {
        let mut by_kind: BTreeMap<ResourceKind, OutcomeCounts> = BTreeMap::new();
        let mut totals = OutcomeCounts::default();

        for result in results {
            by_kind.entry(result.kind).or_default().record(&result.outcome);
            totals.record(&result.outcome);
        }

        Self {
            by_kind,
            totals,
            entries: results.to_vec(),
        }
    }

    pub fn counts(&self, kind: ResourceKind) -> OutcomeCounts {
        self.by_kind.get(&kind).copied().unwrap_or_default()
    }

}

/// Collapses a possibly multi-line runtime message onto one line.
fn single_line(reason: &str) -> String {
    reason
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind_width = self
            .entries
            .iter()
            .map(|e| e.kind.as_str().len())
            .max()
            .unwrap_or(0);
        let id_width = self
            .entries
            .iter()
            .map(|e| e.id.len())
            .max()
            .unwrap_or(0);

        for entry in &self.entries {
            writeln!(
                f,
                "{:<kw$}  {:<iw$}  {:<7}  {}",
                entry.kind.as_str(),
                entry.id,
                entry.outcome.label(),
                single_line(&entry.outcome.reason()),
                kw = kind_width,
                iw = id_width,
            )?;
        }

        if !self.entries.is_empty() {
            writeln!(f)?;
        }
        for (kind, counts) in &self.by_kind {
            writeln!(
                f,
                "{}: {} removed, {} skipped, {} failed",
                kind, counts.removed, counts.skipped, counts.failed
            )?;
        }
        write!(
            f,
            "total: {} removed, {} skipped, {} failed",
            self.totals.removed, self.totals.skipped, self.totals.failed
        )
    }
}
