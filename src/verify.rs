use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::progress::VerifySummary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyStatus {
    Match,
    Missing,
    Mismatch { len: u64 },
    Unreadable { cause: String },
}

impl VerifyStatus {
    pub fn is_match(&self) -> bool {
        matches!(self, VerifyStatus::Match)
    }
}

pub struct VerifyLine<'a>(pub &'a Path, pub &'a VerifyStatus);

impl fmt::Display for VerifyLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let VerifyLine(path, status) = self;
        match status {
            VerifyStatus::Match => write!(f, "OK: {}", path.display()),
            VerifyStatus::Missing => write!(f, "Missing: {}", path.display()),
            VerifyStatus::Mismatch { len } => {
                write!(f, "Mismatch: {} ({} bytes)", path.display(), len)
            }
            VerifyStatus::Unreadable { cause } => {
                write!(f, "Unreadable: {}: {}", path.display(), cause)
            }
        }
    }
}

pub fn check_one(path: &Path, payload: &[u8]) -> VerifyStatus {
    match std::fs::read(path) {
        Ok(bytes) if bytes == payload => VerifyStatus::Match,
        Ok(bytes) => VerifyStatus::Mismatch {
            len: bytes.len() as u64,
        },
        Err(err) if err.kind() == ErrorKind::NotFound => VerifyStatus::Missing,
        Err(err) => VerifyStatus::Unreadable {
            cause: err.to_string(),
        },
    }
}

pub fn verify_targets(paths: &[PathBuf], payload: &[u8]) -> VerifySummary {
    let started = Instant::now();
    let mut matched = 0usize;
    let mut missing = 0usize;
    let mut mismatched = 0usize;
    let mut unreadable = 0usize;
    let mut checked_bytes = 0u64;

    let results = paths
        .iter()
        .map(|path| {
            let status = check_one(path, payload);
            match &status {
                VerifyStatus::Match => {
                    matched += 1;
                    checked_bytes += payload.len() as u64;
                }
                VerifyStatus::Missing => missing += 1,
                VerifyStatus::Mismatch { len } => {
                    mismatched += 1;
                    checked_bytes += len;
                }
                VerifyStatus::Unreadable { .. } => unreadable += 1,
            }
            (path.clone(), status)
        })
        .collect();

    VerifySummary {
        results,
        matched,
        missing,
        mismatched,
        unreadable,
        checked_bytes,
        elapsed: started.elapsed(),
    }
}
