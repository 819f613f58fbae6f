mod payload;
mod png;
mod progress;
mod repair;
mod targets;
mod util;
mod verify;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::HumanBytes;
use payload::Payload;
use progress::{ProgressConfig, ProgressMode, RepairSummary, VerifySummary};
use repair::{RepairConfig, RepairEngine};
use std::path::PathBuf;
use targets::TargetList;
use verify::VerifyLine;

#[derive(Parser)]
#[command(
    name = "assetfix",
    version,
    about = "Overwrite image assets with a minimal valid 1x1 placeholder PNG"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the placeholder to every target, creating parent directories as needed
    Repair {
        /// Target file paths (processed after any --list files)
        paths: Vec<PathBuf>,

        /// Target list file: one path per line, or JSON {"targets": [...]}. Repeatable.
        #[arg(long = "list", value_name = "FILE")]
        lists: Vec<PathBuf>,

        /// Repair engine: sequential (default) or parallel.
        #[arg(long, value_enum, default_value_t = RepairEngine::Sequential)]
        engine: RepairEngine,

        /// Writer threads for the parallel engine. Default: auto.
        #[arg(long)]
        workers: Option<usize>,

        /// fsync each file before reporting it fixed.
        #[arg(long, default_value_t = false)]
        sync: bool,

        /// Exit non-zero if any target failed (all targets are still attempted).
        #[arg(long, default_value_t = false)]
        strict: bool,

        /// Progress display mode: auto (TTY-aware), rich, plain, quiet.
        #[arg(long, value_enum, default_value_t = ProgressMode::Auto)]
        progress: ProgressMode,
    },

    /// Check that every target currently holds exactly the placeholder (no writes)
    Verify {
        /// Target file paths (checked after any --list files)
        paths: Vec<PathBuf>,

        /// Target list file: one path per line, or JSON {"targets": [...]}. Repeatable.
        #[arg(long = "list", value_name = "FILE")]
        lists: Vec<PathBuf>,
    },

    /// Describe the built-in placeholder, optionally writing it to one file
    Payload {
        /// Also write the placeholder to this file.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let payload = Payload::placeholder()?;

    match cli.cmd {
        Commands::Repair {
            paths,
            lists,
            engine,
            workers,
            sync,
            strict,
            progress,
        } => {
            let targets = TargetList::collect(&lists, &paths)?.require_non_empty()?;
            let summary = repair::run(
                &targets,
                &payload,
                RepairConfig {
                    engine,
                    workers,
                    sync,
                },
                ProgressConfig::new(progress),
            )?;
            for outcome in &summary.outcomes {
                println!("{}", outcome);
            }
            print_repair_summary(&summary);
            if strict && summary.failed > 0 {
                bail!(
                    "{} of {} targets could not be fixed",
                    summary.failed,
                    summary.outcomes.len()
                );
            }
        }

        Commands::Verify { paths, lists } => {
            let targets = TargetList::collect(&lists, &paths)?.require_non_empty()?;
            let summary = verify::verify_targets(targets.paths(), payload.bytes());
            for (path, status) in &summary.results {
                println!("{}", VerifyLine(path, status));
            }
            print_verify_summary(&summary);
            if !summary.all_match() {
                bail!(
                    "{} of {} targets do not hold the placeholder",
                    summary.results.len() - summary.matched,
                    summary.results.len()
                );
            }
        }

        Commands::Payload { out } => {
            let info = payload.info();
            println!(
                "Payload: format=png width={} height={} bit_depth={} color_type={} bytes={} crc32={:08x}",
                info.width,
                info.height,
                info.bit_depth,
                info.color_type.name(),
                payload.bytes().len(),
                payload.crc32(),
            );
            if let Some(out) = out {
                repair::repair_one(&out, payload.bytes(), false)
                    .with_context(|| format!("write placeholder to {}", out.display()))?;
                println!("Wrote: {}", out.display());
            }
        }
    }

    Ok(())
}

fn print_repair_summary(summary: &RepairSummary) {
    println!(
        "Repair summary: targets={} fixed={} failed={} bytes={} engine={} workers={} duration={} warnings={}",
        summary.outcomes.len(),
        summary.fixed,
        summary.failed,
        HumanBytes(summary.bytes_written),
        summary.engine,
        summary.workers,
        util::fmt_duration(summary.elapsed),
        summary.warnings.len(),
    );
    for warning in &summary.warnings {
        println!("  warning: {}", warning);
    }
}

fn print_verify_summary(summary: &VerifySummary) {
    println!(
        "Verify summary: targets={} ok={} missing={} mismatched={} unreadable={} checked_bytes={} duration={}",
        summary.results.len(),
        summary.matched,
        summary.missing,
        summary.mismatched,
        summary.unreadable,
        HumanBytes(summary.checked_bytes),
        util::fmt_duration(summary.elapsed),
    );
}
