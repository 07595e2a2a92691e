//! Core types describing runtime resources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error_handling::types::ConfigError;

/// Kinds of resources a container runtime owns.
///
/// The declaration order is the order used inside a removal tier and in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Container,
    Network,
    Image,
    Volume,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Container,
        ResourceKind::Network,
        ResourceKind::Image,
        ResourceKind::Volume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Container => "container",
            ResourceKind::Network => "network",
            ResourceKind::Image => "image",
            ResourceKind::Volume => "volume",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "container" | "containers" => Ok(ResourceKind::Container),
            "network" | "networks" => Ok(ResourceKind::Network),
            "image" | "images" => Ok(ResourceKind::Image),
            "volume" | "volumes" => Ok(ResourceKind::Volume),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown resource kind '{}'",
                other
            ))),
        }
    }
}

/// State reported by the runtime. Only `Running` vetoes removal on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceState {
    Running,
    Stopped,
    Dangling,
    InUse,
}

/// Identifies a resource. Ids are only unique within a kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceKey {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// A single runtime resource as listed by a [`RuntimeClient`](super::RuntimeClient).
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Opaque runtime identifier (full id, or name for volumes).
    pub id: String,
    pub kind: ResourceKind,
    /// Human readable name, when the runtime has one.
    pub name: Option<String>,
    pub state: ResourceState,
    /// Number of references held on this resource.
    pub ref_count: u32,
    /// Repository tags; only images carry them.
    pub tags: Vec<String>,
    /// Resources this one points to (container -> image, image -> parent, ...).
    pub references: Vec<ResourceKey>,
}

impl Resource {
    pub fn new(kind: ResourceKind, id: impl Into<String>, state: ResourceState) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            state,
            ref_count: 0,
            tags: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_ref_count(mut self, ref_count: u32) -> Self {
        self.ref_count = ref_count;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn referencing(mut self, kind: ResourceKind, id: impl Into<String>) -> Self {
        self.references.push(ResourceKey::new(kind, id));
        self
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.kind, self.id.clone())
    }

    /// Name if known, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}
