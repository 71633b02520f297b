//! Strata pipeline binary: generate a world, light it and archive every chunk.
//!
//! Run with `cargo run -p strata-app -- --save-dir out --verify`.

mod archive;

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use strata_config::{CliArgs, Config, default_config_dir};
use strata_lighting::SunlightPropagator;
use strata_voxel::{BlockRegistry, ChunkPos, VoxelManager};
use strata_worldgen::{NoiseDensity, NoiseParams, WorldBounds, WorldGenerator, allocate_chunks};
use tracing::{error, info};

use crate::archive::archive_chunks;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    if let Some(path) = strata_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config)) {
        info!("Writing JSON log to {}", path.display());
    }

    if let Err(e) = config.validate() {
        error!("Invalid config: {e}");
        return ExitCode::FAILURE;
    }

    run(&config)
}

fn run(config: &Config) -> ExitCode {
    let start = Instant::now();
    let voxels = VoxelManager::new();
    let blocks = BlockRegistry::new();

    let [min_x, min_y, min_z] = config.world.chunk_min;
    let [max_x, max_y, max_z] = config.world.chunk_max;
    let bounds = WorldBounds::new(
        ChunkPos::new(min_x, min_y, min_z),
        ChunkPos::new(max_x, max_y, max_z),
    );
    allocate_chunks(&voxels, bounds);

    let density = NoiseDensity::new(&NoiseParams {
        seed: config.world.seed,
        frequency: config.world.noise_frequency,
        ..NoiseParams::default()
    });
    let generation = WorldGenerator::new(config.generation.threads).generate(&voxels, &density);

    let lighting = if config.lighting.enabled {
        Some(SunlightPropagator::new(&voxels, &blocks).initialize_sunlight())
    } else {
        info!("Sunlight propagation disabled");
        None
    };

    let stats = match archive_chunks(
        &voxels.snapshot(),
        config.storage.save_dir.as_deref(),
        config.storage.verify_round_trip,
    ) {
        Ok(stats) => stats,
        Err(e) => {
            error!("Archiving failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let ratio = if stats.compressed_bytes == 0 {
        0.0
    } else {
        stats.raw_bytes as f64 / stats.compressed_bytes as f64
    };
    info!(
        chunks = stats.chunks,
        solid_blocks = generation.solid_blocks,
        sunlit_writes = lighting.map_or(0, |l| l.writes),
        raw_bytes = stats.raw_bytes,
        compressed_bytes = stats.compressed_bytes,
        written = stats.written,
        verified = stats.verified,
        generate_ms = generation.elapsed.as_millis() as u64,
        archive_ms = stats.elapsed.as_millis() as u64,
        total_ms = start.elapsed().as_millis() as u64,
        "Pipeline complete (compression {ratio:.1}x)"
    );
    ExitCode::SUCCESS
}
