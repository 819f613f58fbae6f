use std::path::Path;
use std::time::Duration;

const MAX_AUTO_WORKERS: usize = 8;

pub fn resolve_workers(requested: Option<usize>, jobs: usize) -> usize {
    let wanted = match requested {
        Some(n) => n.max(1),
        None => {
            let cores = num_cpus::get().max(1);
            (cores / 2).clamp(1, MAX_AUTO_WORKERS)
        }
    };
    wanted.min(jobs.max(1))
}

pub fn fmt_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else if secs == 0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

pub fn display_name(p: &Path) -> String {
    p.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| p.display().to_string())
}
