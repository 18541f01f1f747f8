//! tcx-lapfix - correct TCX lap distances against known lap lengths
//!
//! Usage:
//!   tcx-lapfix fix <activity.tcx> <laps.txt> [--use-recorded-time] [--midlap-pause] [--set-pace]
//!   tcx-lapfix laps <activity.tcx> [--output <laps.txt>]
//!
//! The laps file holds one distance in miles per lap, or one `M:SS` pace per
//! mile with `--set-pace`. The corrected activity is written next to the
//! input as `<name>-fixed.tcx`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Target};
use log::{LevelFilter, info};

use tcx_lapfix::options::CorrectionOptions;
use tcx_lapfix::writer::fixed_output_path;
use tcx_lapfix::{fix_tcx, lap_template};

#[derive(Parser)]
#[command(name = "tcx-lapfix")]
#[command(about = "Correct TCX lap distances and splits against known lap lengths", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite an activity so each lap matches the laps file
    Fix {
        /// TCX activity to correct
        tcx: PathBuf,

        /// Laps file: one distance in miles (or pace with --set-pace) per line
        laps: PathBuf,

        /// Trust each lap's recorded TotalTimeSeconds instead of checking it
        #[arg(long)]
        use_recorded_time: bool,

        /// Pauses happen inside laps (treadmill); space points one second apart
        #[arg(long)]
        midlap_pause: bool,

        /// The laps file holds M:SS paces per mile instead of distances
        #[arg(long)]
        set_pace: bool,

        /// Output path (default: <tcx>-fixed.tcx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the correction summary as JSON on stdout
        #[arg(long)]
        summary_json: bool,
    },

    /// Write a laps file template with each lap's recorded distance
    Laps {
        /// TCX activity to read
        tcx: PathBuf,

        /// Output path (default: <tcx stem>-laps.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = Builder::from_default_env();
    if cli.verbose {
        builder.filter_level(LevelFilter::Debug);
    } else if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(LevelFilter::Info);
    }
    // keep stdout clean for the JSON summary
    let target = match cli.command {
        Commands::Fix {
            summary_json: true, ..
        } => Target::Stderr,
        _ => Target::Stdout,
    };
    builder
        .target(target)
        .format_timestamp(None)
        .format_target(false)
        .format_level(false)
        .init();

    match cli.command {
        Commands::Fix {
            tcx,
            laps,
            use_recorded_time,
            midlap_pause,
            set_pace,
            output,
            summary_json,
        } => {
            let opts = CorrectionOptions::from_flags(use_recorded_time, midlap_pause, set_pace);
            run_fix(&tcx, &laps, &opts, output, summary_json)
        }
        Commands::Laps { tcx, output } => run_laps(&tcx, output),
    }
}

fn run_fix(
    tcx_path: &Path,
    laps_path: &Path,
    opts: &CorrectionOptions,
    output: Option<PathBuf>,
    summary_json: bool,
) -> Result<()> {
    let tcx = fs::read_to_string(tcx_path)
        .with_context(|| format!("reading {}", tcx_path.display()))?;
    let laps = fs::read_to_string(laps_path)
        .with_context(|| format!("reading {}", laps_path.display()))?;

    let outcome = fix_tcx(&tcx, &laps, opts)
        .with_context(|| format!("correcting {}", tcx_path.display()))?;

    let out_path = output.unwrap_or_else(|| fixed_output_path(tcx_path));
    fs::write(&out_path, outcome.tcx.as_bytes())
        .with_context(|| format!("writing {}", out_path.display()))?;
    info!("tcx written to {}", out_path.display());

    if summary_json {
        println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
    }
    Ok(())
}

fn run_laps(tcx_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let tcx = fs::read_to_string(tcx_path)
        .with_context(|| format!("reading {}", tcx_path.display()))?;
    let template = lap_template(&tcx)?;

    let out_path = output.unwrap_or_else(|| {
        let stem = tcx_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "activity".to_string());
        tcx_path.with_file_name(format!("{stem}-laps.txt"))
    });
    fs::write(&out_path, template.as_bytes())
        .with_context(|| format!("writing {}", out_path.display()))?;
    info!("laps written to {}", out_path.display());
    Ok(())
}
