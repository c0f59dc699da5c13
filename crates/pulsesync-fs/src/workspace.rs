use std::path::{Path, PathBuf};

use crate::primitives::{ReplaceDirOptions, replace_dir};
use crate::{Error, Result};

/// A directory that is populated off to the side and then moved into its
/// final location in one rename.
///
/// Dropping an uncommitted `StagingDir` deletes it along with whatever was
/// written into it.
pub struct StagingDir {
    dir: tempfile::TempDir,
    destination: PathBuf,
}

impl StagingDir {
    /// Create the staging directory next to `destination` so the final rename
    /// stays on one filesystem.
    pub fn new_beside(destination: impl AsRef<Path>) -> Result<Self> {
        let destination = destination.as_ref().to_path_buf();
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let name = destination.file_name().unwrap_or_default().to_string_lossy();

        let dir = tempfile::Builder::new()
            .prefix(&format!(".{name}.staging-"))
            .tempdir_in(parent)
            .map_err(|e| Error::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;

        Ok(Self { dir, destination })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Replace the destination with the staged tree.
    pub fn commit(self, options: ReplaceDirOptions) -> Result<PathBuf> {
        replace_dir(self.dir.path(), &self.destination, options)?;
        Ok(self.destination.clone())
    }
}
