use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Turn a ledger key into a path under `root`.
///
/// Rejects empty keys, absolute paths, `.`/`..` segments, the ledger file itself,
/// and any key whose existing ancestors under `root` are symlinks (a restore must
/// not write outside the target directory).
pub fn resolve_under(root: &Path, rel: &str, ledger_name: &str) -> Result<PathBuf> {
    if rel.is_empty() {
        return Err(Error::UnsafePath("empty path".into()));
    }
    if rel == ledger_name {
        return Err(Error::UnsafePath(format!("{rel} collides with the ledger file")));
    }
    let rel_path = Path::new(rel);
    if rel_path.is_absolute() {
        return Err(Error::UnsafePath(format!("absolute paths are not allowed: {rel}")));
    }
    let mut cur = root.to_path_buf();
    for comp in rel.split('/') {
        match Path::new(comp).components().next() {
            Some(Component::Normal(c)) if c == comp => {}
            _ => return Err(Error::UnsafePath(format!("bad segment {comp:?} in {rel}"))),
        }
        cur.push(comp);
        if let Ok(m) = std::fs::symlink_metadata(&cur) {
            if m.file_type().is_symlink() {
                return Err(Error::UnsafePath(format!("symlink in path (not following): {rel}")));
            }
        }
    }
    Ok(cur)
}
