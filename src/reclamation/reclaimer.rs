use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use uuid::Uuid;

use super::ledger::Ledger;
use super::tiers::removal_tiers;
use super::types::{Outcome, Phase, ReclaimOptions, ReclaimResult, RemovedReason, SkipReason};
use crate::classification::types::{Classification, ClassifierPolicy, Verdict};
use crate::classification::classify;
use crate::error_handling::types::{ReclaimError, RuntimeError};
use crate::runtime_client::client::RuntimeClient;
use crate::runtime_client::snapshot::Snapshot;
use crate::runtime_client::types::ResourceKind;

/// Everything a finished pass produced.
#[derive(Debug, Clone, Serialize)]
pub struct Pass {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ReclaimResult>,
}

/// Runs reclamation passes against one runtime.
///
/// A pass takes a single snapshot, classifies it, then removes dangling
/// resources tier by tier. Inside a tier up to `workers` removals run at once;
/// the next tier only starts once every removal of the current one returned.
///
/// Failures never abort a pass:
/// - `ResourceBusy` -> skipped (`busy`)
/// - `NotFound` -> removed (`already-gone`)
/// - anything else -> failed, with the runtime's message
///
/// Only a failure to take the snapshot is fatal.
pub struct Reclaimer {
    client: Arc<dyn RuntimeClient>,
    policy: ClassifierPolicy,
    options: ReclaimOptions,
}

impl Reclaimer {
    pub fn new(client: Arc<dyn RuntimeClient>, policy: ClassifierPolicy, options: ReclaimOptions) -> Self {
        Self {
            client,
            policy,
            options,
        }
    }

    pub fn options(&self) -> &ReclaimOptions {
        &self.options
    }

    /// Snapshot, classify and reclaim in one go.
    pub async fn run_pass(&self) -> Result<Pass, ReclaimError> {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let deadline = Instant::now() + self.options.timeout;
        info!("Starting reclamation pass {}", id);

        let capture = timeout(self.options.timeout, Snapshot::capture(self.client.as_ref()));
        let snapshot = match capture.await {
            Ok(captured) => captured,
            Err(_) => Err(RuntimeError::RuntimeUnreachable(format!(
                "no snapshot within {}s",
                self.options.timeout.as_secs()
            ))),
        }
        .map_err(|e| {
            error!("Pass {} aborted, no snapshot: {}", id, e);
            ReclaimError::SnapshotUnavailable(e)
        })?;
        let classification = classify(&snapshot, &self.policy);
        let results = self.reclaim(&snapshot, &classification, deadline).await?;

        let removed = results.iter().filter(|r| r.outcome.is_removed()).count();
        info!(
            "Completed pass {}: {} of {} resource(s) removed",
            id,
            removed,
            results.len()
        );

        Ok(Pass {
            id,
            started_at,
            finished_at: Utc::now(),
            results,
        })
    }

    /// Drives every resource of `snapshot` to a terminal phase.
    ///
    /// Returns exactly one result per snapshot resource, in snapshot order.
    /// Removals not dispatched before `deadline` are skipped (`timeout`);
    /// removals already running are left to finish.
    pub async fn reclaim(
        &self,
        snapshot: &Snapshot,
        classification: &Classification,
        deadline: Instant,
    ) -> Result<Vec<ReclaimResult>, ReclaimError> {
        let mut ledger = Ledger::new(snapshot);

        for (position, verdict) in classification.verdicts().iter().enumerate() {
            if let Verdict::Keep(reason) = verdict {
                ledger.settle(position, Outcome::Skipped((*reason).into()))?;
            }
        }

        let tiers = removal_tiers(snapshot, classification);
        let semaphore = Arc::new(Semaphore::new(self.options.workers.max(1)));
        info!(
            "Reclaiming {} dangling resource(s) in {} tier(s) with {} worker(s)",
            classification.dangling_count(),
            tiers.len(),
            self.options.workers.max(1)
        );

        for (number, tier) in tiers.into_iter().enumerate() {
            let mut set = JoinSet::new();
            let mut dispatched = Vec::new();

            for position in tier {
                if self.options.dry_run {
                    ledger.settle(position, Outcome::Skipped(SkipReason::DryRun))?;
                    continue;
                }

                let blocked = snapshot
                    .referrers_of(position)
                    .iter()
                    .any(|&r| classification.is_dangling(r) && !ledger.is_removed(r));
                if blocked {
                    debug!(
                        "{} still referenced by a resource that was not removed",
                        snapshot.resource(position).key()
                    );
                    ledger.settle(position, Outcome::Skipped(SkipReason::Blocked))?;
                    continue;
                }

                if Instant::now() >= deadline {
                    ledger.settle(position, Outcome::Skipped(SkipReason::Timeout))?;
                    continue;
                }

                ledger.begin(position)?;
                dispatched.push(position);

                let resource = snapshot.resource(position);
                let kind = resource.kind;
                let id = resource.id.clone();
                let client = Arc::clone(&self.client);
                let semaphore = Arc::clone(&semaphore);

                set.spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return (position, Outcome::Skipped(SkipReason::Timeout)),
                    };
                    if Instant::now() >= deadline {
                        return (position, Outcome::Skipped(SkipReason::Timeout));
                    }
                    let outcome = remove_one(client.as_ref(), kind, &id).await;
                    (position, outcome)
                });
            }

            debug!("Tier {}: dispatched {} removal(s)", number, dispatched.len());

            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((position, outcome)) => ledger.settle(position, outcome)?,
                    Err(e) => error!("Removal task in tier {} did not complete: {}", number, e),
                }
            }

            // a task that panicked never reported back
            for position in dispatched {
                if ledger.phase(position) == Phase::Attempting {
                    ledger.settle(
                        position,
                        Outcome::Failed("removal task did not complete".to_string()),
                    )?;
                }
            }
        }

        ledger.into_results()
    }
}

async fn remove_one(client: &dyn RuntimeClient, kind: ResourceKind, id: &str) -> Outcome {
    match client.remove(kind, id).await {
        Ok(()) => {
            info!("Removed {} {}", kind, id);
            Outcome::Removed(RemovedReason::Deleted)
        }
        Err(RuntimeError::NotFound(e)) => {
            debug!("{} {} already gone: {}", kind, id, e);
            Outcome::Removed(RemovedReason::AlreadyGone)
        }
        Err(RuntimeError::ResourceBusy(e)) => {
            warn!("Skipping busy {} {}: {}", kind, id, e);
            Outcome::Skipped(SkipReason::Busy)
        }
        Err(RuntimeError::Unknown(e)) => {
            error!("Failed to remove {} {}: {}", kind, id, e);
            Outcome::Failed(e)
        }
        Err(e @ RuntimeError::RuntimeUnreachable(_)) => {
            error!("Failed to remove {} {}: {}", kind, id, e);
            Outcome::Failed(e.to_string())
        }
    }
}
