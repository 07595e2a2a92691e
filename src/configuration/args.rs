use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::runtime_client::types::ResourceKind;

/// Command line of the `gc` binary.
///
/// Every option is an override: anything left unset keeps the value from the
/// configuration file, or the built-in default when there is no file.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "gc")]
#[command(version)]
#[command(about = "Reclaim disk space from dangling containers, images, volumes and networks")]
pub struct CliArgs {
    /// Path to a TOML configuration file.
    #[arg(long, env = "GC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Container runtime CLI to drive (e.g. `docker`, `podman`).
    #[arg(long, env = "GC_RUNTIME")]
    pub runtime: Option<String>,

    /// Concurrent removals inside one dependency tier.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Stop dispatching removals after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Comma separated resource kinds eligible for removal.
    ///
    /// Kinds left out are still inspected so their references keep other
    /// resources alive.
    #[arg(long, value_delimiter = ',')]
    pub kinds: Option<Vec<ResourceKind>>,

    /// Also remove unused tagged images.
    #[arg(long, action = ArgAction::SetTrue)]
    pub all_images: bool,

    /// Report what would be removed without removing anything.
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,

    /// Print the report as JSON.
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl CliArgs {
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
