use log::{debug, info};

use super::types::{Classification, ClassifierPolicy, KeepReason, Verdict};
use crate::runtime_client::snapshot::Snapshot;
use crate::runtime_client::types::{Resource, ResourceKind, ResourceState};

/// Decides which resources of `snapshot` are dangling.
///
/// A resource is dangling when nothing live references it and it is not
/// running. References held by dangling resources do not count, so a chain
/// like stopped container -> image -> parent image is dangling as a whole.
/// Computed as a fixed point: each round marks every resource whose live
/// reference count dropped to zero and releases its outgoing references,
/// until a round marks nothing.
pub fn classify(snapshot: &Snapshot, policy: &ClassifierPolicy) -> Classification {
    let count = snapshot.len();

    let vetoes: Vec<Option<KeepReason>> = snapshot
        .resources()
        .iter()
        .map(|resource| veto(resource, policy))
        .collect();

    let mut live_refs: Vec<u32> = (0..count)
        .map(|position| snapshot.external_refs(position) + snapshot.referrers_of(position).len() as u32)
        .collect();

    let mut dangling = vec![false; count];
    let mut rounds = 0;

    loop {
        rounds += 1;
        let mut changed = false;

        for position in 0..count {
            if dangling[position] || vetoes[position].is_some() || live_refs[position] > 0 {
                continue;
            }
            dangling[position] = true;
            changed = true;
            debug!(
                "Round {}: {} is dangling",
                rounds,
                snapshot.resource(position).key()
            );
            for &target in snapshot.references_of(position) {
                live_refs[target] = live_refs[target].saturating_sub(1);
            }
        }

        if !changed {
            break;
        }
    }

    let verdicts: Vec<Verdict> = (0..count)
        .map(|position| {
            if dangling[position] {
                Verdict::Dangling
            } else {
                Verdict::Keep(vetoes[position].unwrap_or(KeepReason::InUse))
            }
        })
        .collect();

    let classification = Classification { verdicts, rounds };
    info!(
        "Classified {} of {} resource(s) as dangling in {} round(s)",
        classification.dangling_count(),
        count,
        rounds
    );
    classification
}

/// Reasons that keep a resource regardless of its references.
fn veto(resource: &Resource, policy: &ClassifierPolicy) -> Option<KeepReason> {
    if !policy.kinds.contains(&resource.kind) {
        return Some(KeepReason::Excluded);
    }
    if resource.state == ResourceState::Running {
        return Some(KeepReason::Running);
    }
    if resource.kind == ResourceKind::Network {
        let protected = policy.protected_networks.iter().any(|p| {
            Some(p.as_str()) == resource.name.as_deref() || p == &resource.id
        });
        if protected {
            return Some(KeepReason::Protected);
        }
    }
    if resource.kind == ResourceKind::Image && policy.keep_tagged_images && !resource.tags.is_empty() {
        return Some(KeepReason::Tagged);
    }
    None
}
