use std::path::Path;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug)]
pub struct StabilityOptions {
    pub poll_interval: Duration,
    /// How many consecutive identical observations count as settled.
    pub stable_polls: u32,
    pub deadline: Duration,
}

impl Default for StabilityOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            stable_polls: 2,
            deadline: Duration::from_secs(10),
        }
    }
}

impl StabilityOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn stable_polls(mut self, polls: u32) -> Self {
        self.stable_polls = polls.max(1);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Length and modification time of a file at one observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl Fingerprint {
    pub fn of(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::Read {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// Block until `path` exists and its fingerprint stops changing.
///
/// A file that is still missing when the deadline passes yields `NotFound`;
/// one that keeps changing yields `Unstable`.
pub fn wait_for_stable(path: impl AsRef<Path>, options: StabilityOptions) -> Result<Fingerprint> {
    let path = path.as_ref();
    let started = Instant::now();
    let mut last: Option<Fingerprint> = None;
    let mut unchanged = 0u32;

    loop {
        match Fingerprint::of(path) {
            Ok(current) => {
                if last == Some(current) {
                    unchanged += 1;
                } else {
                    unchanged = 0;
                    last = Some(current);
                }
                if unchanged >= options.stable_polls {
                    return Ok(current);
                }
            }
            Err(Error::NotFound(_)) if started.elapsed() < options.deadline => {
                last = None;
                unchanged = 0;
            }
            Err(e) => return Err(e),
        }

        if started.elapsed() >= options.deadline {
            if last.is_none() {
                return Err(Error::NotFound(path.to_path_buf()));
            }
            return Err(Error::Unstable {
                path: path.to_path_buf(),
                waited: started.elapsed(),
            });
        }
        thread::sleep(options.poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fast() -> StabilityOptions {
        StabilityOptions::new()
            .poll_interval(Duration::from_millis(5))
            .stable_polls(2)
            .deadline(Duration::from_millis(500))
    }

    #[test]
    fn settled_file_returns_fingerprint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.asar");
        std::fs::write(&path, b"12345").unwrap();

        let fingerprint = wait_for_stable(&path, fast()).unwrap();
        assert_eq!(fingerprint.len, 5);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let result = wait_for_stable(
            dir.path().join("absent"),
            fast().deadline(Duration::from_millis(20)),
        );
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
