//! Command-line argument parsing for the Strata pipeline.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Strata command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "strata", about = "Generate, light and archive a voxel world")]
pub struct CliArgs {
    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Terrain noise seed.
    #[arg(long)]
    pub seed: Option<u32>,

    /// Generation worker threads (0 = one per CPU).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Write chunk archives to this directory.
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Skip sunlight propagation.
    #[arg(long)]
    pub no_lighting: bool,

    /// Decode every archive and compare it to its chunk.
    #[arg(long)]
    pub verify: bool,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(threads) = args.threads {
            self.generation.threads = threads;
        }
        if let Some(ref dir) = args.save_dir {
            self.storage.save_dir = Some(dir.clone());
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if args.no_lighting {
            self.lighting.enabled = false;
        }
        if args.verify {
            self.storage.verify_round_trip = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            seed: Some(1234),
            save_dir: Some(PathBuf::from("out")),
            no_lighting: true,
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.world.seed, 1234);
        assert_eq!(config.storage.save_dir, Some(PathBuf::from("out")));
        assert!(!config.lighting.enabled);
        // Non-overridden fields retain defaults
        assert_eq!(config.generation.threads, 0);
        assert!(!config.storage.verify_round_trip);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "strata",
            "--threads",
            "4",
            "--log-level",
            "debug",
            "--verify",
        ]);
        assert_eq!(args.threads, Some(4));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.verify);
        assert!(!args.no_lighting);
        assert!(args.config.is_none());
    }
}
