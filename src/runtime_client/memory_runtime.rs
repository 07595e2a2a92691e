//! In-memory runtime used by the test suites.
//!
//! Behaves like a strict runtime: removing a resource that something else
//! still references fails with `ResourceBusy`, removing an unknown one fails
//! with `NotFound`.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::client::RuntimeClient;
use super::types::{Resource, ResourceKey, ResourceKind};
use crate::error_handling::types::RuntimeError;

#[derive(Debug, Default)]
pub struct MemoryRuntime {
    resources: Mutex<BTreeMap<ResourceKey, Resource>>,
    // scripted failures returned on every removal attempt of that key
    failures: Mutex<HashMap<ResourceKey, RuntimeError>>,
    // keys that vanish right before their removal is attempted
    vanishing: Mutex<Vec<ResourceKey>>,
    removal_log: Mutex<Vec<ResourceKey>>,
    attempt_log: Mutex<Vec<ResourceKey>>,
    latency: Option<Duration>,
    listing_latency: Option<Duration>,
    unreachable: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryRuntime {
    pub fn new(resources: Vec<Resource>) -> Self {
        let runtime = Self::default();
        {
            let mut map = runtime.resources.lock().unwrap();
            for resource in resources {
                map.insert(resource.key(), resource);
            }
        }
        runtime
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_listing_latency(mut self, latency: Duration) -> Self {
        self.listing_latency = Some(latency);
        self
    }

    pub fn fail_with(self, kind: ResourceKind, id: &str, err: RuntimeError) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(ResourceKey::new(kind, id), err);
        self
    }

    pub fn vanish_before_removal(self, kind: ResourceKind, id: &str) -> Self {
        self.vanishing
            .lock()
            .unwrap()
            .push(ResourceKey::new(kind, id));
        self
    }

    pub fn contains(&self, kind: ResourceKind, id: &str) -> bool {
        self.resources
            .lock()
            .unwrap()
            .contains_key(&ResourceKey::new(kind, id))
    }

    pub fn removed(&self) -> Vec<ResourceKey> {
        self.removal_log.lock().unwrap().clone()
    }

    pub fn attempted(&self) -> Vec<ResourceKey> {
        self.attempt_log.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn try_remove(&self, key: &ResourceKey) -> Result<(), RuntimeError> {
        if let Some(err) = self.failures.lock().unwrap().get(key) {
            return Err(err.clone());
        }

        let mut resources = self.resources.lock().unwrap();
        {
            let mut vanishing = self.vanishing.lock().unwrap();
            if let Some(pos) = vanishing.iter().position(|k| k == key) {
                vanishing.remove(pos);
                resources.remove(key);
            }
        }

        let resource = resources
            .get(key)
            .ok_or_else(|| RuntimeError::NotFound(format!("no such {}: {}", key.kind, key.id)))?;

        if resource.ref_count > 0 {
            return Err(RuntimeError::ResourceBusy(format!("{} is in use", key.id)));
        }
        if let Some(holder) = resources.values().find(|r| r.references.contains(key)) {
            return Err(RuntimeError::ResourceBusy(format!(
                "{} is being used by {}",
                key.id,
                holder.key()
            )));
        }

        resources.remove(key);
        self.removal_log.lock().unwrap().push(key.clone());
        Ok(())
    }
}

#[async_trait]
impl RuntimeClient for MemoryRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        if self.unreachable {
            return Err(RuntimeError::RuntimeUnreachable(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, RuntimeError> {
        if self.unreachable {
            return Err(RuntimeError::RuntimeUnreachable(
                "connection refused".to_string(),
            ));
        }
        if let Some(latency) = self.listing_latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self
            .resources
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect())
    }

    async fn remove(&self, kind: ResourceKind, id: &str) -> Result<(), RuntimeError> {
        let key = ResourceKey::new(kind, id);
        self.attempt_log.lock().unwrap().push(key.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let result = self.try_remove(&key);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
