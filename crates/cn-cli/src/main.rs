//! calonorm CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use cn_core::Species;
use std::path::PathBuf;

mod prepare;

#[derive(Parser)]
#[command(name = "calonorm")]
#[command(about = "calonorm - normalized training CSVs from calorimeter shower records")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate per-eta-bin statistics (pass 1 only) and persist them
    Stats {
        /// Directory holding one subdirectory of JSON sources per species
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Directory the per-bin statistics files are written to
        #[arg(short, long)]
        stats_dir: PathBuf,

        /// Species to process; more than one means a joint run
        #[arg(short, long, required = true)]
        particles: Vec<Species>,

        /// Name of the event table inside each source file
        #[arg(long, default_value = "rootTree")]
        tree_name: String,
    },

    /// Full two-pass run: per-bin statistics, then one normalized CSV per source
    Prepare {
        /// Directory holding one subdirectory of JSON sources per species
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Directory the CSVs (and, by default, statistics) are written to
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Where statistics are persisted to or loaded from; defaults to
        /// the output directory
        #[arg(short, long)]
        stats_dir: Option<PathBuf>,

        /// Skip pass 1 and reuse previously persisted statistics
        #[arg(long)]
        load_stats: bool,

        /// Species to process; more than one means a joint run with a
        /// `pid` column
        #[arg(short, long, required = true)]
        particles: Vec<Species>,

        /// Name of the event table inside each source file
        #[arg(long, default_value = "rootTree")]
        tree_name: String,

        /// Per-source event cap as `<marker>=<max>`; repeatable. Defaults
        /// to the known `E2097152=2000` upstream tree defect.
        #[arg(long, value_parser = prepare::parse_cap)]
        cap: Vec<cn_pipeline::EventCap>,

        /// Disable all event caps, including the default one
        #[arg(long, conflicts_with = "cap")]
        no_caps: bool,
    },

    /// One-pass raw branch export, one CSV per source (no statistics or
    /// normalization)
    Dump {
        /// Directory holding per-sample subdirectories of JSON sources
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Directory the CSVs are written to
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Name of the event table inside each source file
        #[arg(long, default_value = "tree_1stPCA")]
        tree_name: String,

        /// Branch to export verbatim; repeatable
        #[arg(long = "column", default_value = "firstPCAbin")]
        columns: Vec<String>,

        /// Only export files whose name contains this marker
        #[arg(long, default_value = "FirstPCA_App")]
        name_filter: String,

        /// Only scan subdirectories whose name contains this marker
        #[arg(long, default_value = "pid")]
        folder_filter: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Stats { input_dir, stats_dir, particles, tree_name } => {
            prepare::cmd_stats(&input_dir, &stats_dir, &particles, &tree_name)
        }
        Commands::Prepare {
            input_dir,
            output_dir,
            stats_dir,
            load_stats,
            particles,
            tree_name,
            cap,
            no_caps,
        } => {
            let caps = prepare::effective_caps(cap, no_caps);
            prepare::cmd_prepare(
                &input_dir,
                &output_dir,
                stats_dir.as_deref(),
                load_stats,
                &particles,
                &tree_name,
                caps,
            )
        }
        Commands::Dump { input_dir, output_dir, tree_name, columns, name_filter, folder_filter } => {
            prepare::cmd_dump(
                &input_dir,
                &output_dir,
                &tree_name,
                &columns,
                &name_filter,
                &folder_filter,
            )
        }
    }
}
