//! Point-in-time view of the runtime.
//!
//! A [`Snapshot`] is built once per pass and never mutated afterwards. Building
//! it normalizes whatever the runtime returned so later stages can rely on:
//! - each [`ResourceKey`] appears once;
//! - every edge points at a resource inside the snapshot;
//! - `ref_count` is at least the number of incoming edges.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;

use super::client::RuntimeClient;
use super::types::{Resource, ResourceKey, ResourceKind, ResourceState};
use crate::error_handling::types::RuntimeError;

#[derive(Debug, Clone)]
pub struct Snapshot {
    taken_at: DateTime<Utc>,
    resources: Vec<Resource>,
    index: HashMap<ResourceKey, usize>,
    // outgoing edges, by position in `resources`
    references: Vec<Vec<usize>>,
    // incoming edges
    referrers: Vec<Vec<usize>>,
}

impl Snapshot {
    /// Lists every resource kind through `client` and builds a snapshot.
    ///
    /// All kinds are listed even when only some are eligible for removal, so
    /// that references held by excluded kinds still count.
    pub async fn capture(client: &dyn RuntimeClient) -> Result<Self, RuntimeError> {
        client.ping().await?;

        let mut listed = Vec::new();
        for kind in ResourceKind::ALL {
            let resources = client.list(kind).await.map_err(|e| {
                warn!("Failed to list {} resources: {}", kind, e);
                e
            })?;
            debug!("Listed {} {} resource(s)", resources.len(), kind);
            listed.extend(resources);
        }

        let snapshot = Self::new(listed);
        info!(
            "Snapshot taken at {} with {} resource(s)",
            snapshot.taken_at.to_rfc3339(),
            snapshot.len()
        );
        Ok(snapshot)
    }

    /// Builds a snapshot from an already listed set of resources.
    pub fn new(listed: Vec<Resource>) -> Self {
        let mut resources: Vec<Resource> = Vec::with_capacity(listed.len());
        let mut index = HashMap::with_capacity(listed.len());

        for resource in listed {
            let key = resource.key();
            if index.contains_key(&key) {
                debug!("Dropping duplicate listing for {}", key);
                continue;
            }
            index.insert(key, resources.len());
            resources.push(resource);
        }

        let mut references = vec![Vec::new(); resources.len()];
        let mut referrers = vec![Vec::new(); resources.len()];

        for (from, resource) in resources.iter().enumerate() {
            for target in &resource.references {
                match index.get(target) {
                    Some(&to) if to == from => {
                        debug!("Ignoring self reference on {}", target);
                    }
                    Some(&to) => {
                        if !references[from].contains(&to) {
                            references[from].push(to);
                            referrers[to].push(from);
                        }
                    }
                    None => {
                        debug!(
                            "{} references {} which is not in the snapshot",
                            resource.key(),
                            target
                        );
                    }
                }
            }
        }

        for (position, resource) in resources.iter_mut().enumerate() {
            let incoming = referrers[position].len() as u32;
            resource.ref_count = resource.ref_count.max(incoming);
            if resource.kind != ResourceKind::Container && resource.state != ResourceState::Running {
                resource.state = if resource.ref_count == 0 {
                    ResourceState::Dangling
                } else {
                    ResourceState::InUse
                };
            }
        }

        Self {
            taken_at: Utc::now(),
            resources,
            index,
            references,
            referrers,
        }
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, position: usize) -> &Resource {
        &self.resources[position]
    }

    pub fn position_of(&self, key: &ResourceKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Positions of the resources `position` points to.
    pub fn references_of(&self, position: usize) -> &[usize] {
        &self.references[position]
    }

    /// Positions of the resources pointing to `position`.
    pub fn referrers_of(&self, position: usize) -> &[usize] {
        &self.referrers[position]
    }

    /// References counted in `ref_count` that no edge in the snapshot explains.
    pub fn external_refs(&self, position: usize) -> u32 {
        let incoming = self.referrers[position].len() as u32;
        self.resources[position].ref_count.saturating_sub(incoming)
    }
}
