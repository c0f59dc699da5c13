use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Root-relative target as recorded in the header.
    Link { target: String },
}

/// One header entry, addressed by its path inside the archive.
#[derive(Clone, Debug)]
pub struct Entry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub size: u64,
    pub executable: bool,
    pub unpacked: bool,
}

impl Entry {
    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, EntryKind::Link { .. })
    }
}

#[derive(Clone, Debug)]
pub struct ArchiveReport {
    pub destination: PathBuf,
    pub entry_count: usize,
    pub total_bytes: u64,
    pub entries: Vec<Entry>,
}

impl ArchiveReport {
    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.is_file())
    }

    /// Archive-relative paths of files stored beside the archive rather than
    /// inside it.
    pub fn unpacked_paths(&self) -> BTreeSet<PathBuf> {
        self.files()
            .filter(|e| e.unpacked)
            .map(|e| e.path.clone())
            .collect()
    }

    pub fn target_of(&self, entry: &Entry) -> PathBuf {
        self.destination.join(&entry.path)
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.entries.iter().any(|e| e.path == path)
    }
}

#[derive(Clone, Debug)]
pub struct PackReport {
    pub archive: PathBuf,
    pub entry_count: usize,
    pub packed_bytes: u64,
    pub unpacked_count: usize,
    /// SHA-256 of the header JSON, as Electron validates it.
    pub header_hash: String,
}
