use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use pulsesync_fs::ReplaceDirOptions;

#[derive(Clone)]
pub struct ExtractOptions {
    /// Check each file against the integrity block recorded in the header,
    /// when the header has one.
    pub verify_integrity: bool,
    pub replace: ReplaceDirOptions,
    pub on_progress: Option<Arc<dyn Fn(Progress) + Send + Sync>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            verify_integrity: true,
            replace: ReplaceDirOptions::default(),
            on_progress: None,
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verify_integrity(mut self, verify: bool) -> Self {
        self.verify_integrity = verify;
        self
    }

    pub fn replace(mut self, options: ReplaceDirOptions) -> Self {
        self.replace = options;
        self
    }

    pub fn on_progress(mut self, callback: Arc<dyn Fn(Progress) + Send + Sync>) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub(crate) fn report(&self, progress: Progress) {
        if let Some(callback) = &self.on_progress {
            callback(progress);
        }
    }
}

#[derive(Clone, Debug)]
pub struct Progress {
    pub bytes_processed: u64,
    pub total_bytes: u64,
    pub current_file: PathBuf,
}

impl Progress {
    pub fn percentage(&self) -> f32 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes_processed as f32 / self.total_bytes as f32) * 100.0
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PackOptions {
    /// Source-relative file paths to store beside the archive in
    /// `<archive>.unpacked/` instead of inside it.
    pub unpacked: BTreeSet<PathBuf>,
}

impl PackOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unpacked(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.unpacked.extend(paths);
        self
    }

    pub fn is_unpacked(&self, path: &std::path::Path) -> bool {
        self.unpacked.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_percentage() {
        let progress = Progress {
            bytes_processed: 25,
            total_bytes: 100,
            current_file: PathBuf::from("a.js"),
        };
        assert_eq!(progress.percentage(), 25.0);

        let empty = Progress {
            bytes_processed: 0,
            total_bytes: 0,
            current_file: PathBuf::new(),
        };
        assert_eq!(empty.percentage(), 100.0);
    }

    #[test]
    fn extract_defaults_verify() {
        assert!(ExtractOptions::new().verify_integrity);
        assert!(!ExtractOptions::new().verify_integrity(false).verify_integrity);
    }

    #[test]
    fn pack_tracks_unpacked_paths() {
        let options = PackOptions::new().unpacked([PathBuf::from("native/addon.node")]);
        assert!(options.is_unpacked(std::path::Path::new("native/addon.node")));
        assert!(!options.is_unpacked(std::path::Path::new("main.js")));
    }
}
