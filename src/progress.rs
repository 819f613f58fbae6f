use clap::ValueEnum;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::repair::{RepairEngine, WriteOutcome};
use crate::util;
use crate::verify::VerifyStatus;

const MAX_STORED_WARNINGS: usize = 32;
const PLAIN_INTERVAL: Duration = Duration::from_secs(2);
const SPINNER_TICK: Duration = Duration::from_millis(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum ProgressMode {
    Auto,
    Rich,
    Plain,
    Quiet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedProgressMode {
    Rich,
    Plain,
    Quiet,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressConfig {
    pub mode: ProgressMode,
    tty_override: Option<bool>,
}

impl ProgressConfig {
    pub fn new(mode: ProgressMode) -> Self {
        Self {
            mode,
            tty_override: None,
        }
    }

    #[cfg(test)]
    pub fn with_tty_override(mut self, is_tty: bool) -> Self {
        self.tty_override = Some(is_tty);
        self
    }

    pub fn resolve_mode(self) -> ResolvedProgressMode {
        match self.mode {
            ProgressMode::Rich => ResolvedProgressMode::Rich,
            ProgressMode::Plain => ResolvedProgressMode::Plain,
            ProgressMode::Quiet => ResolvedProgressMode::Quiet,
            ProgressMode::Auto => {
                let tty = self
                    .tty_override
                    .unwrap_or_else(|| std::io::stderr().is_terminal());
                if tty {
                    ResolvedProgressMode::Rich
                } else {
                    ResolvedProgressMode::Plain
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepairSummary {
    pub outcomes: Vec<WriteOutcome>,
    pub fixed: usize,
    pub failed: usize,
    pub bytes_written: u64,
    pub engine: RepairEngine,
    pub workers: usize,
    pub elapsed: Duration,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VerifySummary {
    pub results: Vec<(PathBuf, VerifyStatus)>,
    pub matched: usize,
    pub missing: usize,
    pub mismatched: usize,
    pub unreadable: usize,
    pub checked_bytes: u64,
    pub elapsed: Duration,
}

impl VerifySummary {
    pub fn all_match(&self) -> bool {
        self.results.iter().all(|(_, status)| status.is_match())
    }
}

#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    pub elapsed: Duration,
    pub total: u64,
    pub processed: u64,
    pub failed: u64,
    pub warnings: Vec<String>,
}

// Copy of the counters taken under the lock, rendered after it is released.
#[derive(Debug, Clone)]
struct Tally {
    stage: String,
    done: u64,
    total: u64,
    failed: u64,
    elapsed: Duration,
    writers: Vec<String>,
}

impl Tally {
    fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.done as f64 * 100.0 / self.total as f64
        }
    }

    fn writers_display(&self) -> String {
        if self.writers.is_empty() {
            "-".to_string()
        } else {
            self.writers.join(",")
        }
    }
}

#[derive(Clone)]
pub struct ProgressHandle {
    shared: Arc<Shared>,
}

pub struct ProgressReporter {
    handle: ProgressHandle,
}

struct Shared {
    label: String,
    mode: ResolvedProgressMode,
    bars: Option<Bars>,
    counters: Mutex<Counters>,
    closed: AtomicBool,
}

struct Bars {
    multi: MultiProgress,
    overall: ProgressBar,
    writers: Mutex<HashMap<String, ProgressBar>>,
}

#[derive(Debug)]
struct Counters {
    started: Instant,
    stage: String,
    total: u64,
    done: u64,
    failed: u64,
    last_plain_line: Instant,
    writers: HashMap<String, String>,
    warnings: Vec<String>,
}

impl Counters {
    fn tally(&self) -> Tally {
        let mut writers = self.writers.keys().cloned().collect::<Vec<_>>();
        writers.sort();
        writers.truncate(4);
        Tally {
            stage: self.stage.clone(),
            done: self.done,
            total: self.total,
            failed: self.failed,
            elapsed: self.started.elapsed(),
            writers,
        }
    }

    fn remember_warning(&mut self, message: &str) {
        if self.warnings.len() >= MAX_STORED_WARNINGS {
            self.warnings.remove(0);
        }
        self.warnings.push(message.to_string());
    }
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, total: u64, config: ProgressConfig) -> Self {
        let label = label.into();
        let mode = config.resolve_mode();
        let now = Instant::now();
        let bars = (mode == ResolvedProgressMode::Rich).then(|| Bars::new(&label, total));

        let shared = Arc::new(Shared {
            label,
            mode,
            bars,
            counters: Mutex::new(Counters {
                started: now,
                stage: "starting".to_string(),
                total,
                done: 0,
                failed: 0,
                last_plain_line: now,
                writers: HashMap::new(),
                warnings: Vec::new(),
            }),
            closed: AtomicBool::new(false),
        });

        Self {
            handle: ProgressHandle { shared },
        }
    }

    pub fn handle(&self) -> ProgressHandle {
        self.handle.clone()
    }

    pub fn finish(self, final_message: impl Into<String>) -> ProgressOutcome {
        self.handle.shared.close(Some(final_message.into()))
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        let _ = self.handle.shared.close(None);
    }
}

impl ProgressHandle {
    pub fn set_stage(&self, stage: impl Into<String>) {
        let tally = {
            let mut counters = self.shared.counters.lock().unwrap();
            counters.stage = stage.into();
            counters.last_plain_line = Instant::now();
            counters.tally()
        };
        self.shared.draw(&tally, true);
    }

    pub fn record(&self, succeeded: bool) {
        let (tally, line_due) = {
            let mut counters = self.shared.counters.lock().unwrap();
            counters.done += 1;
            if !succeeded {
                counters.failed += 1;
            }
            let now = Instant::now();
            let line_due = counters.done >= counters.total
                || now.duration_since(counters.last_plain_line) >= PLAIN_INTERVAL;
            if line_due {
                counters.last_plain_line = now;
            }
            (counters.tally(), line_due)
        };
        self.shared.draw(&tally, line_due);
    }

    pub fn set_operation_status(&self, operation_id: impl Into<String>, status: impl Into<String>) {
        let id = operation_id.into();
        let status = status.into();
        self.shared
            .counters
            .lock()
            .unwrap()
            .writers
            .insert(id.clone(), status.clone());
        if let Some(bars) = &self.shared.bars {
            bars.writer(&id).set_message(status);
        }
    }

    pub fn clear_operation(&self, operation_id: &str) {
        self.shared
            .counters
            .lock()
            .unwrap()
            .writers
            .remove(operation_id);
        if let Some(bars) = &self.shared.bars {
            bars.drop_writer(operation_id);
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        self.shared.say("INFO", &message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        self.shared
            .counters
            .lock()
            .unwrap()
            .remember_warning(&message);
        self.shared.say("WARN", &message);
    }
}

impl Shared {
    fn draw(&self, tally: &Tally, line_due: bool) {
        match (self.mode, &self.bars) {
            (ResolvedProgressMode::Rich, Some(bars)) => bars.update(tally),
            (ResolvedProgressMode::Plain, _) if line_due => eprintln!(
                "[PROGRESS] {} elapsed={} stage={} done={} / {} ({:.1}%) failed={} active={}",
                self.label,
                util::fmt_duration(tally.elapsed),
                tally.stage,
                tally.done,
                tally.total,
                tally.percent(),
                tally.failed,
                tally.writers_display()
            ),
            _ => {}
        }
    }

    fn say(&self, level: &str, message: &str) {
        let line = format!("[{}] {}: {}", level, self.label, message);
        match (self.mode, &self.bars) {
            (ResolvedProgressMode::Quiet, _) => {}
            (ResolvedProgressMode::Rich, Some(bars)) => {
                if bars.multi.println(&line).is_err() {
                    eprintln!("{}", line);
                }
            }
            _ => eprintln!("{}", line),
        }
    }

    fn close(&self, final_message: Option<String>) -> ProgressOutcome {
        let (tally, warnings) = {
            let counters = self.counters.lock().unwrap();
            (counters.tally(), counters.warnings.clone())
        };

        if !self.closed.swap(true, Ordering::Relaxed) {
            match (self.mode, &self.bars) {
                (ResolvedProgressMode::Plain, _) => {
                    if let Some(msg) = final_message.as_deref() {
                        eprintln!("[DONE] {}: {}", self.label, msg);
                    }
                }
                (ResolvedProgressMode::Rich, Some(bars)) => bars.finish(final_message),
                _ => {}
            }
        }

        ProgressOutcome {
            elapsed: tally.elapsed,
            total: tally.total,
            processed: tally.done,
            failed: tally.failed,
            warnings,
        }
    }
}

impl Bars {
    fn new(label: &str, total: u64) -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total.max(1)));
        overall.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} {per_sec} | {msg}",
            )
            .expect("valid progress template"),
        );
        overall.set_message(format!("{} starting", label));
        overall.enable_steady_tick(SPINNER_TICK);

        Self {
            multi,
            overall,
            writers: Mutex::new(HashMap::new()),
        }
    }

    fn update(&self, tally: &Tally) {
        self.overall.set_length(tally.total.max(1));
        self.overall.set_position(tally.done.min(tally.total));
        self.overall.set_message(format!(
            "stage={} failed={} active={}",
            tally.stage,
            tally.failed,
            tally.writers_display()
        ));
    }

    fn writer(&self, id: &str) -> ProgressBar {
        let mut writers = self.writers.lock().unwrap();
        writers
            .entry(id.to_string())
            .or_insert_with(|| {
                let spinner = self.multi.add(ProgressBar::new_spinner());
                spinner.set_style(
                    ProgressStyle::with_template("{spinner:.magenta} {prefix:.bold} {msg}")
                        .expect("valid writer template")
                        .tick_chars("|/-\\ "),
                );
                spinner.enable_steady_tick(SPINNER_TICK);
                spinner.set_prefix(id.to_string());
                spinner
            })
            .clone()
    }

    fn drop_writer(&self, id: &str) {
        if let Some(spinner) = self.writers.lock().unwrap().remove(id) {
            spinner.finish_and_clear();
        }
    }

    fn finish(&self, final_message: Option<String>) {
        for (_, spinner) in self.writers.lock().unwrap().drain() {
            spinner.finish_and_clear();
        }
        match final_message {
            Some(msg) => self.overall.finish_with_message(msg),
            None => self.overall.finish_and_clear(),
        }
    }
}
