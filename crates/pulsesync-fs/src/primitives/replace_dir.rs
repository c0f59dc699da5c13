use crate::{Error, Result};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Retry policy for directory operations that can race with other processes
/// holding handles open (virus scanners, indexers, the target app itself).
#[derive(Clone, Copy, Debug)]
pub struct Options {
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            retry_count: 5,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = count.max(1);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Move `src` to `dest`, removing an existing `dest` first.
pub fn replace_dir(src: impl AsRef<Path>, dest: impl AsRef<Path>, options: Options) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    remove_dir_all(dest, options)?;

    let mut attempts = 0;
    loop {
        attempts += 1;
        match std::fs::rename(src, dest) {
            Ok(()) => return Ok(()),
            Err(e) if attempts >= options.retry_count => {
                return Err(Error::ReplaceDir {
                    path: dest.to_path_buf(),
                    attempts,
                    source: e,
                });
            }
            Err(e) => {
                tracing::debug!(
                    path = %dest.display(),
                    attempts,
                    error = %e,
                    "rename failed, retrying"
                );
                thread::sleep(options.retry_delay * attempts);
            }
        }
    }
}

/// Recursively delete `path`. A path that does not exist counts as removed.
pub fn remove_dir_all(path: impl AsRef<Path>, options: Options) -> Result<()> {
    let path = path.as_ref();

    let mut attempts = 0;
    loop {
        attempts += 1;
        match std::fs::remove_dir_all(path) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) if attempts >= options.retry_count => {
                return Err(Error::Remove {
                    path: path.to_path_buf(),
                    attempts,
                    source: e,
                });
            }
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    attempts,
                    error = %e,
                    "remove failed, retrying"
                );
                thread::sleep(options.retry_delay * attempts);
            }
        }
    }
}
