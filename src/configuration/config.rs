use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::args::CliArgs;
use crate::classification::types::ClassifierPolicy;
use crate::error_handling::types::ConfigError;
use crate::reclamation::types::ReclaimOptions;
use crate::runtime_client::types::ResourceKind;

pub const MAX_WORKERS: usize = 64;

/// Collector configuration.
///
/// Loaded from a TOML file where every key is optional, then overridden by
/// command line flags. Call [`Config::validate`] before using it.
///
/// ```toml
/// runtime = "podman"
/// workers = 8
/// timeout_secs = 120
/// kinds = ["container", "image"]
/// keep_tagged_images = true
/// protected_networks = ["bridge", "host", "none", "podman"]
/// dry_run = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Container runtime CLI binary.
    pub runtime: String,
    /// Concurrent removals per tier, `1..=64`.
    pub workers: usize,
    /// Dispatch deadline for a pass, in seconds.
    pub timeout_secs: u64,
    /// Kinds eligible for removal.
    pub kinds: Vec<ResourceKind>,
    pub keep_tagged_images: bool,
    /// Network names that are never removed.
    pub protected_networks: Vec<String>,
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        let policy = ClassifierPolicy::default();
        let options = ReclaimOptions::default();
        Self {
            runtime: "docker".to_string(),
            workers: options.workers,
            timeout_secs: options.timeout.as_secs(),
            kinds: policy.kinds,
            keep_tagged_images: policy.keep_tagged_images,
            protected_networks: policy.protected_networks,
            dry_run: options.dry_run,
        }
    }
}

impl Config {
    /// Reads a TOML configuration file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            error!("Unable to read configuration file {}: {}", path.display(), e);
            ConfigError::IoError(e)
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            error!("Unable to parse configuration file {}: {}", path.display(), e);
            ConfigError::from(e)
        })?;
        debug!("Configuration from file: {:?}", config);
        Ok(config)
    }

    /// Builds the effective configuration: file (if any), then flags, then validation.
    pub fn resolve(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(args);
        config.validate()?;
        Ok(config)
    }

    /// Applies command line overrides on top of the current values.
    pub fn apply(&mut self, args: &CliArgs) {
        if let Some(runtime) = &args.runtime {
            self.runtime = runtime.clone();
        }
        if let Some(workers) = args.workers {
            self.workers = workers;
        }
        if let Some(timeout_secs) = args.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(kinds) = &args.kinds {
            self.kinds = kinds.clone();
        }
        if args.all_images {
            self.keep_tagged_images = false;
        }
        if args.dry_run {
            self.dry_run = true;
        }
    }

    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.runtime.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "runtime must name a container runtime CLI".to_string(),
            ));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::NotInRange(format!(
                "workers must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::NotInRange(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.kinds.is_empty() {
            return Err(ConfigError::InvalidValue(
                "at least one resource kind must be eligible".to_string(),
            ));
        }
        self.kinds.sort();
        self.kinds.dedup();
        Ok(())
    }

    pub fn policy(&self) -> ClassifierPolicy {
        ClassifierPolicy {
            kinds: self.kinds.clone(),
            keep_tagged_images: self.keep_tagged_images,
            protected_networks: self.protected_networks.clone(),
        }
    }

    pub fn options(&self) -> ReclaimOptions {
        ReclaimOptions {
            workers: self.workers,
            timeout: Duration::from_secs(self.timeout_secs),
            dry_run: self.dry_run,
        }
    }
}
