use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Paths (relative to the walked root) that tree walks never report.
///
/// The set holds exactly what it was built with; the collection builds it from the
/// ledger file name alone, so only `<root>/<ledger>` is skipped. A file of the same
/// name in a subdirectory is tracked like any other.
#[derive(Clone, Debug)]
pub struct ExclusionSet {
    set: GlobSet,
    patterns: Vec<String>,
}

impl ExclusionSet {
    pub fn ledger_only(ledger_name: &str) -> Result<Self> {
        Self::literals(&[ledger_name])
    }

    pub fn literals(names: &[&str]) -> Result<Self> {
        let mut b = GlobSetBuilder::new();
        let mut patterns = Vec::with_capacity(names.len());
        for name in names {
            let pat = globset::escape(name);
            let glob = Glob::new(&pat)
                .map_err(|e| Error::InvalidPattern(format!("{name:?}: {e}")))?;
            b.add(glob);
            patterns.push(pat);
        }
        let set = b
            .build()
            .map_err(|e| Error::InvalidPattern(e.to_string()))?;
        Ok(Self { set, patterns })
    }

    pub fn is_excluded(&self, rel: &str) -> bool {
        self.set.is_match(rel)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// A regular file found under the walked root.
#[derive(Clone, Debug)]
pub struct TrackedFile {
    /// `/`-separated path relative to the root; the ledger key for this file.
    pub rel: String,
    pub path: PathBuf,
}

/// List every regular file under `root` in a stable order (file names sorted per
/// directory, depth first). Directories and symlinks produce no entries.
pub fn tracked_files(root: &Path, exclusions: &ExclusionSet) -> Result<Vec<TrackedFile>> {
    let mut out = Vec::new();
    for ent in walkdir::WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let ent = ent?;
        if !ent.file_type().is_file() {
            continue;
        }
        let rel = rel_key(root, ent.path())?;
        if exclusions.is_excluded(&rel) {
            continue;
        }
        out.push(TrackedFile { rel, path: ent.path().to_path_buf() });
    }
    Ok(out)
}

fn rel_key(root: &Path, path: &Path) -> Result<String> {
    let rel = pathdiff::diff_paths(path, root).ok_or_else(|| {
        Error::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path is outside the walked root"),
        )
    })?;
    let mut parts = Vec::new();
    for c in rel.components() {
        let part = c.as_os_str().to_str().ok_or_else(|| {
            Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
            )
        })?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}
