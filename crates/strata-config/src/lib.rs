//! Configuration for the Strata world pipeline.
//!
//! Settings persist to disk as a RON file and can be overridden from the
//! command line via clap.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, GenerationConfig, LightingConfig, StorageConfig, WorldConfig,
    default_config_dir,
};
pub use error::ConfigError;
