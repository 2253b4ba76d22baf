//! phototab CLI

mod jsonl;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pt_table::{Table, TableConfig, codec, merge_tree};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "phototab")]
#[command(about = "phototab - photon-table accumulation")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an empty table for a config
    Create {
        /// Table config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output table file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Accumulate photon records into a new table
    ///
    /// Each events file is filled by its own worker; workers are merged in a
    /// fixed tree, so the output does not depend on `--threads`.
    Fill {
        /// Table config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Photon records (JSON lines), one worker per file
        #[arg(short, long, required = true)]
        events: Vec<PathBuf>,

        /// Output table file
        #[arg(short, long)]
        output: PathBuf,

        /// Threads (0 = auto)
        #[arg(long, default_value = "0")]
        threads: usize,

        /// Leave the table open for further merges
        #[arg(long)]
        no_finalize: bool,
    },

    /// Merge stored tables with identical axes and generator parameters
    ///
    /// Inputs may come from differently seeded runs; the merged table records
    /// every contributing seed.
    Merge {
        /// Input tables
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output table file
        #[arg(short, long)]
        output: PathBuf,

        /// Finalize the merged table
        #[arg(long)]
        finalize: bool,

        /// Threads (0 = auto)
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Summarize a table as JSON
    Inspect {
        /// Table file
        input: PathBuf,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Omit per-cell statistics
        #[arg(long)]
        no_cells: bool,
    },

    /// Check that a table decodes and re-encodes to identical bytes
    Verify {
        /// Table file
        input: PathBuf,
    },

    /// Print version
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Create { config, output } => cmd_create(&config, &output),
        Commands::Fill { config, events, output, threads, no_finalize } => {
            cmd_fill(&config, &events, &output, threads, !no_finalize)
        }
        Commands::Merge { inputs, output, finalize, threads } => {
            cmd_merge(&inputs, &output, finalize, threads)
        }
        Commands::Inspect { input, output, no_cells } => {
            cmd_inspect(&input, output.as_ref(), !no_cells)
        }
        Commands::Verify { input } => cmd_verify(&input),
        Commands::Version => {
            println!("phototab {}", pt_core::VERSION);
            Ok(())
        }
    }
}

fn setup_threads(threads: usize) {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }
}

fn load_config(path: &Path) -> Result<TableConfig> {
    tracing::info!(path = %path.display(), "loading table config");
    TableConfig::from_path(path).with_context(|| format!("config {}", path.display()))
}

fn save_table(table: &Table, path: &Path) -> Result<()> {
    codec::save(table, path).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        events = table.provenance().total_events,
        total_weight = table.provenance().total_weight,
        finalized = table.is_finalized(),
        "table written"
    );
    Ok(())
}

fn cmd_create(config: &Path, output: &Path) -> Result<()> {
    let cfg = load_config(config)?;
    let table = Table::new(&cfg)?;
    tracing::info!(cells = table.n_cells(), axes = table.axes().len(), "created empty table");
    save_table(&table, output)
}

fn cmd_fill(
    config: &Path,
    events: &[PathBuf],
    output: &Path,
    threads: usize,
    finalize: bool,
) -> Result<()> {
    setup_threads(threads);
    let cfg = load_config(config)?;

    let mut sources = Vec::with_capacity(events.len());
    for path in events {
        let records = jsonl::read_file(path)?;
        tracing::info!(path = %path.display(), records = records.len(), "read photon records");
        sources.push(records);
    }

    let mut table = pt_table::accumulate_parallel(&cfg, sources)?;
    tracing::info!(
        workers = events.len(),
        events = table.provenance().total_events,
        overflow = table.overflow().sample_count(),
        "accumulation complete"
    );
    if finalize {
        table.finalize();
    }
    save_table(&table, output)
}

fn cmd_merge(inputs: &[PathBuf], output: &Path, finalize: bool, threads: usize) -> Result<()> {
    setup_threads(threads);
    let mut tables = Vec::with_capacity(inputs.len());
    for path in inputs {
        let table = codec::load(path).with_context(|| format!("loading {}", path.display()))?;
        if table.is_finalized() {
            bail!("{} is finalized and cannot take part in a merge", path.display());
        }
        tables.push(table);
    }
    let Some(mut table) = merge_tree(tables)? else { bail!("no input tables") };
    tracing::info!(inputs = inputs.len(), events = table.provenance().total_events, "merged tables");
    if finalize {
        table.finalize();
    }
    save_table(&table, output)
}

fn cmd_inspect(input: &Path, output: Option<&PathBuf>, with_cells: bool) -> Result<()> {
    let table = codec::load(input).with_context(|| format!("loading {}", input.display()))?;

    let mut summary = serde_json::json!({
        "provenance": table.provenance(),
        "finalized": table.is_finalized(),
        "value_axis": table.value_axis(),
        "axes": table.axes(),
        "shape": table.axes().iter().map(|a| a.n_bins()).collect::<Vec<_>>(),
        "n_cells": table.n_cells(),
        "in_range_weight": table.in_range_weight(),
        "overflow": cell_json(table.overflow()),
    });
    if with_cells {
        let cells: Vec<serde_json::Value> = table
            .iter_nonempty()
            .map(|(index, cell)| {
                let mut v = cell_json(cell);
                v["index"] = serde_json::json!(index);
                v["weight_density"] = serde_json::json!(table.weight_density(&index));
                v
            })
            .collect();
        summary["cells"] = serde_json::Value::Array(cells);
    }

    write_json(output, summary)
}

fn cell_json(cell: &pt_table::Cell) -> serde_json::Value {
    serde_json::json!({
        "sample_count": cell.sample_count(),
        "weight_sum": cell.weight_sum(),
        "effective_entries": cell.effective_entries(),
        "mean": cell.mean(),
        "variance": cell.variance(),
        "sample_variance": cell.sample_variance(),
    })
}

fn cmd_verify(input: &Path) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let table = codec::decode(&bytes)?;
    let reencoded = codec::encode(&table);
    if reencoded != bytes {
        bail!("{} is not in canonical form", input.display());
    }
    let checksum = codec::checksum(&bytes).unwrap_or_default();
    tracing::info!(path = %input.display(), bytes = bytes.len(), "table verified");
    println!("ok {checksum:016x} {}", input.display());
    Ok(())
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
