pub mod args;
pub mod config;

pub use args::CliArgs;
pub use config::Config;
