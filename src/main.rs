//! CLI entry point for the turnstile rollup tool.
//!
//! Provides subcommands for each batch stage (merge, derive, map, sort,
//! reduce) and a `run` command that chains them end to end.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use turnstile_rollup::{
    PipelineError,
    config::PipelineConfig,
    output::{print_json, print_pretty, write_derived},
    pipeline::run_pipeline,
    stages::{
        delta::{BoundaryPolicy, derive_hourly},
        filter::filter_regular,
        mapper::map_file,
        merge::create_master_file,
        reducer::{reduce_file, reduce_pairs},
        sort::sort_file,
    },
};

#[derive(Parser)]
#[command(name = "turnstile_rollup")]
#[command(about = "Rolls turnstile counter files up into hourly entries per unit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline: merge, filter, derive, map, reduce
    Run {
        /// Raw turnstile files, in merge order
        #[arg(value_name = "FILE")]
        inputs: Vec<PathBuf>,

        /// JSON config file; command-line values override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for intermediate and final artifacts
        #[arg(short = 'd', long)]
        work_dir: Option<PathBuf>,

        /// First-row hourly value: an integer sentinel or "missing"
        #[arg(short, long)]
        boundary: Option<BoundaryPolicy>,

        /// Group mapper output by unit before reducing
        #[arg(long, default_value_t = false)]
        sort: bool,

        /// Log the run report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Concatenate raw files into one master file with a single header
    Merge {
        #[arg(value_name = "FILE")]
        inputs: Vec<PathBuf>,

        #[arg(short, long, default_value = "master_turnstile_file.csv")]
        output: PathBuf,
    },
    /// Keep REGULAR readings and add hourly entry/exit columns
    Derive {
        #[arg(value_name = "MASTER")]
        input: PathBuf,

        #[arg(short, long, default_value = "hourly_turnstile.csv")]
        output: PathBuf,

        /// First-row hourly value: an integer sentinel or "missing"
        #[arg(short, long, default_value_t = BoundaryPolicy::default())]
        boundary: BoundaryPolicy,
    },
    /// Emit UNIT<TAB>hourly-entries pairs from a derived file
    Map {
        #[arg(value_name = "DERIVED")]
        input: PathBuf,

        #[arg(short, long, default_value = "mapper_result.txt")]
        output: PathBuf,
    },
    /// Stable-sort mapper output by unit
    Sort {
        #[arg(value_name = "PAIRS")]
        input: PathBuf,

        #[arg(short, long, default_value = "mapper_result_sorted.txt")]
        output: PathBuf,
    },
    /// Sum pairs per contiguous run of units (stdin to stdout by default)
    Reduce {
        #[arg(value_name = "PAIRS")]
        input: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/turnstile_rollup.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("turnstile_rollup.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            inputs,
            config,
            work_dir,
            boundary,
            sort,
            json,
        } => {
            let mut pipeline = match config {
                Some(path) => PipelineConfig::load(&path)?,
                None => PipelineConfig::default(),
            };
            if !inputs.is_empty() {
                pipeline.inputs = inputs;
            }
            if let Some(dir) = work_dir {
                pipeline.work_dir = dir;
            }
            if let Some(policy) = boundary {
                pipeline.boundary = policy;
            }
            if sort {
                pipeline.sort_before_reduce = true;
            }

            let report = run_pipeline(&pipeline)?;
            if json {
                print_json(&report)?;
            } else {
                print_pretty(&report);
            }
        }
        Commands::Merge { inputs, output } => {
            create_master_file(&inputs, &output)?;
        }
        Commands::Derive {
            input,
            output,
            boundary,
        } => {
            let filtered = filter_regular(&input)?;
            let derived = derive_hourly(filtered.rows, boundary);
            write_derived(&output, &derived.rows)?;
            info!(
                rows = derived.rows.len(),
                malformed = filtered.skipped,
                non_numeric = derived.skipped,
                output = %output.display(),
                "Derived dataset written"
            );
        }
        Commands::Map { input, output } => {
            map_file(&input, &output)?;
        }
        Commands::Sort { input, output } => {
            sort_file(&input, &output)?;
        }
        Commands::Reduce {
            input: Some(input),
            output: Some(output),
        } => {
            reduce_file(&input, &output)?;
        }
        Commands::Reduce { input, output } => {
            let reader: Box<dyn io::Read> = match input {
                Some(path) => Box::new(
                    std::fs::File::open(&path).map_err(|e| PipelineError::io(&path, e))?,
                ),
                None => Box::new(io::stdin().lock()),
            };
            let writer: Box<dyn io::Write> = match output {
                Some(path) => Box::new(
                    std::fs::File::create(&path).map_err(|e| PipelineError::io(&path, e))?,
                ),
                None => Box::new(io::stdout().lock()),
            };
            reduce_pairs(reader, writer)?;
        }
    }

    Ok(())
}
