use log::{debug, warn};

use crate::classification::types::Classification;
use crate::runtime_client::snapshot::Snapshot;

/// Splits the dangling resources into removal tiers.
///
/// A resource lands in a tier strictly after every dangling resource that
/// references it, so a container always precedes its image, volumes and
/// networks, and a child image precedes its parent. Members of one tier have
/// no ordering constraint between them and are sorted by kind, then id.
///
/// Runtimes only produce acyclic reference graphs; if a cycle slips through
/// anyway its members are placed together in a final tier.
pub fn removal_tiers(snapshot: &Snapshot, classification: &Classification) -> Vec<Vec<usize>> {
    let dangling = classification.dangling();

    // pending referrers, restricted to the dangling sub-graph
    let mut blocking: Vec<usize> = vec![0; snapshot.len()];
    for &position in &dangling {
        blocking[position] = snapshot
            .referrers_of(position)
            .iter()
            .filter(|&&r| classification.is_dangling(r))
            .count();
    }

    let mut remaining: Vec<usize> = dangling;
    let mut tiers = Vec::new();

    while !remaining.is_empty() {
        let (mut ready, rest): (Vec<usize>, Vec<usize>) =
            remaining.into_iter().partition(|&p| blocking[p] == 0);

        if ready.is_empty() {
            warn!(
                "Reference cycle among {} dangling resource(s), removing them in one final tier",
                rest.len()
            );
            let mut last = rest;
            sort_tier(snapshot, &mut last);
            tiers.push(last);
            break;
        }

        sort_tier(snapshot, &mut ready);
        for &position in &ready {
            for &target in snapshot.references_of(position) {
                if classification.is_dangling(target) {
                    blocking[target] = blocking[target].saturating_sub(1);
                }
            }
        }
        debug!("Tier {} holds {} resource(s)", tiers.len(), ready.len());
        tiers.push(ready);
        remaining = rest;
    }

    tiers
}

fn sort_tier(snapshot: &Snapshot, tier: &mut [usize]) {
    tier.sort_by(|&a, &b| {
        let a = snapshot.resource(a);
        let b = snapshot.resource(b);
        a.kind.cmp(&b.kind).then_with(|| a.id.cmp(&b.id))
    });
}
