use crate::primitives::atomic_write::{self, temp_sibling};
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// The path `<path><suffix>`, e.g. `app.asar` -> `app.asar.copy`.
pub fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Copy `path` to `<path><suffix>`, replacing any previous backup.
///
/// The copy lands under a temporary name first so an interrupted backup never
/// leaves a truncated file where a good one used to be.
pub fn backup_file(path: impl AsRef<Path>, suffix: &str) -> Result<PathBuf> {
    let path = path.as_ref();
    let backup = backup_path(path, suffix);
    copy_file(path, &backup)?;
    Ok(backup)
}

/// Copy `from` over `to` through a temporary sibling of `to`.
pub fn copy_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<u64> {
    let from = from.as_ref();
    let to = to.as_ref();

    if !from.is_file() {
        return Err(Error::NotFound(from.to_path_buf()));
    }

    let tmp = temp_sibling(to)?;
    let copied = fs::copy(from, tmp.path()).map_err(|e| Error::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    })?;

    atomic_write::finish(tmp, to, atomic_write::Options::new().sync(true))?;
    Ok(copied)
}
