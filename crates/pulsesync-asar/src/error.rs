use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("archive is corrupted: {0}")]
    Corrupted(String),

    #[error("invalid archive header: {0}")]
    InvalidHeader(#[source] serde_json::Error),

    #[error("unsafe entry name '{name}' under '{parent}'")]
    UnsafeEntryName { name: String, parent: PathBuf },

    #[error("link '{link}' points outside the archive: '{target}'")]
    LinkEscape { link: PathBuf, target: PathBuf },

    #[error("integrity check failed for '{path}': {source}")]
    IntegrityMismatch {
        path: PathBuf,
        source: pulsesync_verify::VerifyError,
    },

    #[error("entry not found in archive: {0}")]
    EntryNotFound(PathBuf),

    #[error("unpacked file missing for '{path}' at '{expected}'")]
    MissingUnpacked { path: PathBuf, expected: PathBuf },

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to create directory: {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("failed to create link '{link}' -> '{target}': {source}")]
    LinkCreationFailed {
        link: PathBuf,
        target: PathBuf,
        source: io::Error,
    },

    #[error("failed to pack '{path}': {source}")]
    PackFailed { path: PathBuf, source: io::Error },

    #[error("cannot store '{0}' in an archive")]
    UnsupportedEntry(PathBuf),

    #[error("workspace operation failed: {0}")]
    Workspace(#[from] pulsesync_fs::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
