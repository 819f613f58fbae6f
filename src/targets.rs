use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct TargetManifest {
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetList {
    paths: Vec<PathBuf>,
}

impl TargetList {
    // List files first (in the order given), then positional paths.
    pub fn collect(lists: &[PathBuf], paths: &[PathBuf]) -> Result<Self> {
        let mut out = Self::default();
        for list in lists {
            let loaded = load_list_file(list)?;
            out.paths.extend(loaded);
        }
        out.paths.extend(paths.iter().cloned());
        Ok(out)
    }

    pub fn require_non_empty(self) -> Result<Self> {
        if self.is_empty() {
            bail!("no target paths given (pass paths or --list <FILE>)");
        }
        Ok(self)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl From<Vec<PathBuf>> for TargetList {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

pub fn load_list_file(path: &Path) -> Result<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read target list {}", path.display()))?;

    let is_json = path
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        let manifest: TargetManifest = serde_json::from_str(&text)
            .with_context(|| format!("parse JSON target list {}", path.display()))?;
        for (idx, t) in manifest.targets.iter().enumerate() {
            if t.trim().is_empty() {
                bail!("{}: target #{} is empty", path.display(), idx);
            }
        }
        Ok(manifest.targets.into_iter().map(PathBuf::from).collect())
    } else {
        Ok(parse_plain_list(&text))
    }
}

fn parse_plain_list(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(PathBuf::from)
        .collect()
}
