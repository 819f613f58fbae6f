use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::payload::Payload;
use crate::progress::{ProgressConfig, ProgressHandle, ProgressReporter, RepairSummary};
use crate::targets::TargetList;
use crate::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum RepairEngine {
    Sequential,
    Parallel,
}

impl fmt::Display for RepairEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairEngine::Sequential => f.write_str("sequential"),
            RepairEngine::Parallel => f.write_str("parallel"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RepairConfig {
    pub engine: RepairEngine,
    pub workers: Option<usize>,
    pub sync: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            engine: RepairEngine::Sequential,
            workers: None,
            sync: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Fixed { path: PathBuf },
    Failed { path: PathBuf, cause: String },
}

impl WriteOutcome {
    fn from_result(path: &Path, res: Result<u64>) -> Self {
        match res {
            Ok(_) => WriteOutcome::Fixed {
                path: path.to_path_buf(),
            },
            Err(err) => WriteOutcome::Failed {
                path: path.to_path_buf(),
                cause: format!("{:#}", err),
            },
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            WriteOutcome::Fixed { path } | WriteOutcome::Failed { path, .. } => path,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, WriteOutcome::Fixed { .. })
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Fixed { path } => write!(f, "Fixed: {}", path.display()),
            WriteOutcome::Failed { path, cause } => {
                write!(f, "Error fixing {}: {}", path.display(), cause)
            }
        }
    }
}

#[derive(Debug)]
struct WriteJob {
    index: usize,
    path: PathBuf,
}

pub fn repair_one(path: &Path, payload: &[u8], sync: bool) -> Result<u64> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(payload)
        .with_context(|| format!("write {}", path.display()))?;
    if sync {
        file.sync_all()
            .with_context(|| format!("sync {}", path.display()))?;
    }
    Ok(payload.len() as u64)
}

// One outcome per path, in input order; a failing path never stops the rest.
pub fn repair(
    paths: &[PathBuf],
    payload: &[u8],
    sync: bool,
    progress: Option<&ProgressHandle>,
) -> Vec<WriteOutcome> {
    const OP_ID: &str = "wrt00";
    let outcomes = paths
        .iter()
        .enumerate()
        .map(|(idx, path)| {
            if let Some(progress) = progress {
                progress.set_operation_status(
                    OP_ID,
                    format!("{}/{} {}", idx + 1, paths.len(), util::display_name(path)),
                );
            }
            let outcome = WriteOutcome::from_result(path, repair_one(path, payload, sync));
            if let Some(progress) = progress {
                progress.record(outcome.is_fixed());
            }
            outcome
        })
        .collect();
    if let Some(progress) = progress {
        progress.clear_operation(OP_ID);
    }
    outcomes
}

// Outcomes are slotted by input index so the returned order matches `paths`.
pub fn repair_parallel(
    paths: &[PathBuf],
    payload: Arc<[u8]>,
    workers: usize,
    sync: bool,
    progress: ProgressHandle,
) -> Vec<WriteOutcome> {
    let workers = workers.max(1);
    let (job_tx, job_rx) = bounded::<WriteJob>(workers * 4);
    let (done_tx, done_rx) = unbounded::<(usize, WriteOutcome)>();

    let handles = (0..workers)
        .map(|writer_id| {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let payload = Arc::clone(&payload);
            let progress = progress.clone();
            std::thread::spawn(move || {
                writer_worker(writer_id, job_rx, done_tx, payload, sync, progress)
            })
        })
        .collect::<Vec<_>>();
    drop(job_rx);
    drop(done_tx);

    for (index, path) in paths.iter().enumerate() {
        let job = WriteJob {
            index,
            path: path.clone(),
        };
        if job_tx.send(job).is_err() {
            // Every writer is gone; the remaining slots are filled below.
            break;
        }
    }
    drop(job_tx);

    let mut slots: Vec<Option<WriteOutcome>> = vec![None; paths.len()];
    for (index, outcome) in done_rx.iter() {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(outcome);
        }
    }

    for h in handles {
        if h.join().is_err() {
            progress.warning("writer worker thread panicked");
        }
    }

    slots
        .into_iter()
        .zip(paths)
        .map(|(slot, path)| {
            slot.unwrap_or_else(|| {
                progress.record(false);
                WriteOutcome::Failed {
                    path: path.clone(),
                    cause: "writer exited before reporting this target".to_string(),
                }
            })
        })
        .collect()
}

fn writer_worker(
    writer_id: usize,
    rx: Receiver<WriteJob>,
    done: Sender<(usize, WriteOutcome)>,
    payload: Arc<[u8]>,
    sync: bool,
    progress: ProgressHandle,
) {
    let op_id = format!("wrt{:02}", writer_id);
    for job in rx.iter() {
        progress.set_operation_status(op_id.clone(), util::display_name(&job.path));
        let outcome = WriteOutcome::from_result(&job.path, repair_one(&job.path, &payload, sync));
        progress.record(outcome.is_fixed());
        if done.send((job.index, outcome)).is_err() {
            break;
        }
    }
    progress.clear_operation(&op_id);
}

pub fn run(
    targets: &TargetList,
    payload: &Payload,
    cfg: RepairConfig,
    progress_cfg: ProgressConfig,
) -> Result<RepairSummary> {
    if targets.is_empty() {
        bail!("no target paths to repair");
    }

    let workers = match cfg.engine {
        RepairEngine::Sequential => 1,
        RepairEngine::Parallel => util::resolve_workers(cfg.workers, targets.len()),
    };

    let reporter = ProgressReporter::new("repair", targets.len() as u64, progress_cfg);
    let progress = reporter.handle();
    progress.log(format!(
        "Decision snapshot: engine={} workers={} targets={} payload={}B sync={}",
        cfg.engine,
        workers,
        targets.len(),
        payload.bytes().len(),
        cfg.sync
    ));
    progress.set_stage(format!("writing {} targets", targets.len()));

    let outcomes = match cfg.engine {
        RepairEngine::Sequential => {
            repair(targets.paths(), payload.bytes(), cfg.sync, Some(&progress))
        }
        RepairEngine::Parallel => repair_parallel(
            targets.paths(),
            payload.shared(),
            workers,
            cfg.sync,
            progress.clone(),
        ),
    };

    let fixed = outcomes.iter().filter(|o| o.is_fixed()).count();
    let failed = outcomes.len() - fixed;
    if let Some(first) = outcomes.iter().find(|o| !o.is_fixed()) {
        progress.warning(format!(
            "{} of {} targets could not be fixed (first: {})",
            failed,
            outcomes.len(),
            first.path().display()
        ));
    }

    let finished = reporter.finish(format!("{} fixed, {} failed", fixed, failed));
    debug_assert_eq!(finished.processed, finished.total);
    debug_assert_eq!(finished.failed, failed as u64);

    Ok(RepairSummary {
        fixed,
        failed,
        bytes_written: (fixed * payload.bytes().len()) as u64,
        engine: cfg.engine,
        workers,
        elapsed: finished.elapsed,
        warnings: finished.warnings,
        outcomes,
    })
}
