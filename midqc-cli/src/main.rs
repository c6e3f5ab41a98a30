//! midqc command-line interface.
//!
//! Replays recorded digit batches through the occupancy pipeline, one
//! pipeline per input file, and merges the published objects.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Parser, Subcommand};
use log::{debug, info};
use midqc_algorithms::{
    merge_published, AggregationPipeline, PipelineConfig, PipelineCounters,
};
use midqc_core::{MonitorObject, MonitorSet};
use midqc_io::{BatchReader, SnapshotWriter};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    MidqcIo(#[from] midqc_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] midqc_core::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] midqc_algorithms::ConfigLoadError),

    #[error("{}: {source}", path.display())]
    Input {
        path: PathBuf,
        source: Box<CliError>,
    },

    #[error("no object named '{0}' in the merged set")]
    UnknownObject(String),

    #[error("object '{0}' is a histogram, not a 2D grid")]
    NotAGrid(String),
}

/// Occupancy monitoring for muon identifier digits.
#[derive(Parser)]
#[command(name = "midqc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay batch files through the pipeline and merge the results
    Replay {
        /// Input batch file(s), JSON lines
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Snapshot output path (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Batches per processing cycle
        #[arg(long, default_value = "100")]
        cycle_length: usize,

        /// Also dump one merged object as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Object to dump with --csv
        #[arg(long, default_value = "OccupancyMapB")]
        grid: String,

        /// Worker threads (default: all cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about a batch file
    Info {
        /// Input batch file
        input: PathBuf,
    },
}

/// Outcome of replaying one file.
#[derive(Debug)]
struct Replay {
    published: MonitorSet,
    counters: PipelineCounters,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            input,
            config,
            output,
            cycle_length,
            csv,
            grid,
            threads,
            verbose,
        } => {
            init_logging(verbose);

            let config = match config {
                Some(path) => PipelineConfig::from_file(path)?,
                None => PipelineConfig::default(),
            };
            debug!("pipeline configuration: {:?}", config);

            if let Some(threads) = threads {
                // A global pool may already exist; keep it in that case
                if let Err(err) = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build_global()
                {
                    debug!("using existing thread pool: {}", err);
                }
            }

            let start = Instant::now();
            let replays: Vec<Replay> = input
                .par_iter()
                .map(|path| {
                    replay_file(path, config, cycle_length.max(1)).map_err(|source| {
                        CliError::Input {
                            path: path.clone(),
                            source: Box::new(source),
                        }
                    })
                })
                .collect::<Result<_>>()?;

            let mut totals = PipelineCounters::default();
            for replay in &replays {
                totals.batches += replay.counters.batches;
                totals.frames += replay.counters.frames;
                totals.hits += replay.counters.hits;
                totals.unknown_geometry += replay.counters.unknown_geometry;
            }

            let merged = merge_published(replays.into_iter().map(|r| r.published).collect())?;

            SnapshotWriter::create(&output)?.write_set(&merged)?;
            info!("wrote {} objects to {}", merged.len(), output.display());

            if let Some(csv) = csv {
                let target = match merged.get(&grid) {
                    Some(MonitorObject::Grid(g)) => g,
                    Some(MonitorObject::Ratio(r)) => r.ratio(),
                    Some(MonitorObject::Histogram(_)) => return Err(CliError::NotAGrid(grid)),
                    None => return Err(CliError::UnknownObject(grid)),
                };
                SnapshotWriter::create(&csv)?.write_grid_csv(target)?;
                info!("wrote {} to {}", grid, csv.display());
            }

            let elapsed = start.elapsed();
            println!(
                "Replayed {} file(s) in {:.2}s",
                input.len(),
                elapsed.as_secs_f64()
            );
            println!("Batches: {}", totals.batches);
            println!("Frames: {}", totals.frames);
            println!("Hits: {}", totals.hits);
            println!("Unknown identifiers: {}", totals.unknown_geometry);
            if elapsed.as_secs_f64() > 0.0 {
                println!(
                    "Throughput: {:.0} hits/s",
                    totals.hits as f64 / elapsed.as_secs_f64()
                );
            }
        }

        Commands::Info { input } => {
            init_logging(false);

            let mut batches = 0usize;
            let mut frames = 0usize;
            let mut hits = 0usize;
            let mut empty_frames = 0usize;
            let mut orbits: Option<(u32, u32)> = None;

            for batch in BatchReader::open(&input)? {
                let batch = batch?;
                batches += 1;
                frames += batch.frames.len();
                hits += batch.hits.len();
                empty_frames += batch.frames.iter().filter(|f| f.n_entries == 0).count();
                for frame in &batch.frames {
                    let orbit = frame.interaction.orbit;
                    orbits = Some(match orbits {
                        Some((lo, hi)) => (lo.min(orbit), hi.max(orbit)),
                        None => (orbit, orbit),
                    });
                }
            }

            println!("File: {}", input.display());
            println!("Batches: {}", batches);
            println!("Frames: {} ({} empty)", frames, empty_frames);
            println!("Hits: {}", hits);
            if let Some((lo, hi)) = orbits {
                println!("Orbit range: {} - {}", lo, hi);
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// Runs every batch of one file through a fresh pipeline.
fn replay_file(path: &Path, config: PipelineConfig, cycle_length: usize) -> Result<Replay> {
    let mut pipeline = AggregationPipeline::new(config)?;

    for batch in BatchReader::open(path)? {
        pipeline.process_batch(&batch?)?;
        if pipeline.counters().batches % cycle_length as u64 == 0 {
            pipeline.end_of_cycle();
        }
    }
    pipeline.end_of_cycle();

    Ok(Replay {
        published: pipeline.publish(),
        counters: pipeline.counters(),
    })
}
