//! Bibliographic Record Deduplication CLI
//!
//! Driver for the dedup engine: loads harvested record dumps into the
//! document store, runs deduplication sweeps, and repairs group state.

mod config;
mod progress;

use anyhow::{Context, Result};
use bibdedup_core::{DedupEngine, RecordStore, SledStore};
use bibdedup_formats::jsonl::JsonlReader;
use bibdedup_formats::now_millis;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::DriverConfig;
use progress::{print_dedup_report, print_ingest_report, ProgressReporter};

#[derive(Parser)]
#[command(name = "bibdedup")]
#[command(version, about = "Deduplicate bibliographic records across catalog sources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a harvested record dump (JSONL, optionally gzipped) into the store
    Ingest {
        /// Input file with one record document per line
        #[arg(short, long)]
        input: PathBuf,

        /// Driver config file (YAML or TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Deduplicate all records flagged for processing
    Dedup {
        /// Driver config file (YAML or TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of worker threads (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Stop after roughly this many records
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Verify and repair dedup group consistency
    Check {
        /// Driver config file (YAML or TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show a stored record, its derived keys, and its group
    Inspect {
        /// Record id to inspect
        #[arg(value_name = "ID")]
        id: String,

        /// Driver config file (YAML or TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to initialize logging")?;

    match cli.command {
        Commands::Ingest { input, config } => {
            let config = DriverConfig::load_or_default(config.as_deref())?;
            run_ingest(&input, &config)
        }
        Commands::Dedup {
            config,
            workers,
            limit,
        } => {
            let config = DriverConfig::load_or_default(config.as_deref())?;
            run_dedup(&config, workers, limit)
        }
        Commands::Check { config } => {
            let config = DriverConfig::load_or_default(config.as_deref())?;
            run_check(&config)
        }
        Commands::Inspect { id, config } => {
            let config = DriverConfig::load_or_default(config.as_deref())?;
            run_inspect(&id, &config)
        }
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "bibdedup",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

fn open_engine(config: &DriverConfig) -> Result<(Arc<SledStore>, DedupEngine<SledStore>)> {
    let store = Arc::new(
        SledStore::open(&config.store.path)
            .with_context(|| format!("Failed to open store at {}", config.store.path.display()))?,
    );
    let engine = DedupEngine::new(store.clone(), Arc::new(config.format_mapper()));
    Ok((store, engine))
}

fn run_ingest(input: &PathBuf, config: &DriverConfig) -> Result<()> {
    let (store, engine) = open_engine(config)?;
    let mut reader =
        JsonlReader::open(input).with_context(|| format!("Failed to open {}", input.display()))?;

    info!("Loading records from {}", input.display());
    let reporter = ProgressReporter::new(reader.total_bytes().unwrap_or(0));

    let mut loaded = 0usize;
    let mut skipped = 0usize;
    while let Some(result) = reader.next() {
        let mut record = result?;
        record.update_needed = true;
        record.updated = now_millis();

        if let Err(e) = engine.refresh_candidate_keys(&mut record) {
            warn!("Skipping record {}: {}", record.id, e);
            skipped += 1;
            continue;
        }
        store.save_record(&record)?;
        loaded += 1;

        if loaded % 100 == 0 {
            reporter.update(reader.bytes_processed(), loaded, 0, skipped);
        }
    }
    reporter.update(reader.bytes_processed(), loaded, 0, skipped);
    reporter.finish();
    store.flush()?;

    print_ingest_report(input, loaded, skipped + reader.lines_skipped());
    Ok(())
}

fn run_dedup(config: &DriverConfig, workers: Option<usize>, limit: Option<usize>) -> Result<()> {
    let (store, engine) = open_engine(config)?;

    if let Some(workers) = workers.or(config.dedup.workers) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build_global()
            .ok();
    }

    let total_records = store.record_count()?;
    info!(
        "Starting dedup sweep over store of {} records",
        total_records
    );
    let reporter = ProgressReporter::new_record_based(total_records as u64);

    let mut processed = 0usize;
    let failed = std::sync::Mutex::new(std::collections::HashSet::new());
    loop {
        // A failed record keeps its update_needed flag; skip it for the
        // rest of this run so the sweep terminates
        let fetch = config.dedup.batch_size + failed.lock().unwrap().len();
        let batch: Vec<_> = store
            .update_needed(fetch)?
            .into_iter()
            .filter(|record| !failed.lock().unwrap().contains(&record.id))
            .collect();
        if batch.is_empty() {
            break;
        }

        // Each subject record is handled by exactly one worker; group
        // mutations synchronize inside the engine
        batch.par_iter().for_each(|record| {
            if let Err(e) = engine.dedup_record(record) {
                error!("Deduplication of {} failed: {}", record.id, e);
                failed.lock().unwrap().insert(record.id.clone());
            }
        });

        processed += batch.len();
        let stats = engine.stats();
        reporter.update(0, processed, stats.subjects_matched, 0);

        if limit.is_some_and(|limit| processed >= limit) {
            info!("Record limit reached, stopping sweep");
            break;
        }
    }
    reporter.finish();
    store.flush()?;

    let stats = engine.stats();
    print_dedup_report(
        &config.store.path,
        processed,
        stats.subjects_matched,
        stats.groups_created,
        stats.groups_removed,
        stats.components_matched,
    );
    Ok(())
}

fn run_check(config: &DriverConfig) -> Result<()> {
    let (store, engine) = open_engine(config)?;

    let mut checked = 0usize;
    let mut repairs = 0usize;
    for group_id in store.group_ids()? {
        checked += 1;
        for line in engine.check_dedup_record(&group_id)? {
            println!("{line}");
            repairs += 1;
        }
    }
    store.flush()?;

    info!("Checked {} groups, {} repairs", checked, repairs);
    Ok(())
}

fn run_inspect(id: &str, config: &DriverConfig) -> Result<()> {
    let (store, engine) = open_engine(config)?;

    let Some(mut record) = store.record(id)? else {
        anyhow::bail!("Record {} not found", id);
    };

    println!("{}", serde_json::to_string_pretty(&record)?);

    match engine.refresh_candidate_keys(&mut record) {
        Ok(changed) if changed => {
            println!("\nStored candidate keys are stale for the current payload");
        }
        Ok(_) => {}
        Err(e) => println!("\nCannot derive candidate keys: {e}"),
    }

    if let Some(group_id) = &record.dedup_id {
        match store.group(group_id)? {
            Some(group) => {
                println!("\nDedup group:");
                println!("{}", serde_json::to_string_pretty(&group)?);
            }
            None => println!("\nDedup group {group_id} is missing"),
        }
    }
    Ok(())
}
