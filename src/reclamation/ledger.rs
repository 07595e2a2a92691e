use log::{debug, error};

use super::types::{Outcome, Phase, ReclaimResult};
use crate::error_handling::types::ReclaimError;
use crate::runtime_client::snapshot::Snapshot;

/// Tracks the phase of every snapshot resource and collects one result each.
///
/// Only the task driving the pass writes to the ledger; workers hand their
/// outcomes back through the join loop.
#[derive(Debug)]
pub struct Ledger<'a> {
    snapshot: &'a Snapshot,
    phases: Vec<Phase>,
    results: Vec<Option<ReclaimResult>>,
}

impl<'a> Ledger<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            phases: vec![Phase::Pending; snapshot.len()],
            results: vec![None; snapshot.len()],
        }
    }

    pub fn phase(&self, position: usize) -> Phase {
        self.phases[position]
    }

    /// `Pending -> Attempting`.
    pub fn begin(&mut self, position: usize) -> Result<(), ReclaimError> {
        match self.phases[position] {
            Phase::Pending => {
                self.phases[position] = Phase::Attempting;
                debug!("{} -> attempting", self.snapshot.resource(position).key());
                Ok(())
            }
            other => Err(self.invalid(position, other, Phase::Attempting)),
        }
    }

    /// Moves a pending or attempting resource to its terminal phase.
    pub fn settle(&mut self, position: usize, outcome: Outcome) -> Result<(), ReclaimError> {
        let next = Phase::from(&outcome);
        let current = self.phases[position];
        if current.is_terminal() {
            return Err(self.invalid(position, current, next));
        }

        let resource = self.snapshot.resource(position);
        debug!("{} -> {}", resource.key(), outcome);
        self.phases[position] = next;
        self.results[position] = Some(ReclaimResult::new(resource, outcome));
        Ok(())
    }

    /// True once the resource reached `Removed`.
    pub fn is_removed(&self, position: usize) -> bool {
        self.phases[position] == Phase::Removed
    }

    /// Results in snapshot order. Fails if any resource never settled.
    pub fn into_results(self) -> Result<Vec<ReclaimResult>, ReclaimError> {
        let snapshot = self.snapshot;
        self.results
            .into_iter()
            .enumerate()
            .map(|(position, result)| {
                result.ok_or_else(|| {
                    let key = snapshot.resource(position).key();
                    error!("{} never reached a terminal phase", key);
                    ReclaimError::InvalidTransition(format!("{} was left unsettled", key))
                })
            })
            .collect()
    }

    fn invalid(&self, position: usize, from: Phase, to: Phase) -> ReclaimError {
        let key = self.snapshot.resource(position).key();
        error!("Rejected transition {:?} -> {:?} for {}", from, to, key);
        ReclaimError::InvalidTransition(format!("{}: {:?} -> {:?}", key, from, to))
    }
}
