use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    NotInRange(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::TomlError(err.to_string())
    }
}

/// Failures surfaced by a container runtime, passed through verbatim.
///
/// Only `RuntimeUnreachable` is fatal to a pass. The other variants are
/// per-resource and decide the outcome recorded for that resource.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    RuntimeUnreachable(String),
    ResourceBusy(String),
    NotFound(String),
    Unknown(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::RuntimeUnreachable(e) => write!(f, "Container runtime unreachable: {}", e),
            RuntimeError::ResourceBusy(e) => write!(f, "Resource busy: {}", e),
            RuntimeError::NotFound(e) => write!(f, "Resource not found: {}", e),
            RuntimeError::Unknown(e) => write!(f, "Runtime error: {}", e),
        }
    }
}

impl std::error::Error for RuntimeError {}

#[derive(Debug)]
pub enum ReclaimError {
    SnapshotUnavailable(RuntimeError),
    InvalidTransition(String),
}

impl fmt::Display for ReclaimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReclaimError::SnapshotUnavailable(e) => write!(f, "Unable to take snapshot: {}", e),
            ReclaimError::InvalidTransition(e) => write!(f, "Invalid state transition: {}", e),
        }
    }
}

impl std::error::Error for ReclaimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReclaimError::SnapshotUnavailable(e) => Some(e),
            ReclaimError::InvalidTransition(_) => None,
        }
    }
}

impl From<RuntimeError> for ReclaimError {
    fn from(err: RuntimeError) -> Self {
        ReclaimError::SnapshotUnavailable(err)
    }
}
