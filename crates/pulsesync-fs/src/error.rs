use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to copy '{from}' to '{to}': {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to replace directory '{path}' after {attempts} attempts: {source}")]
    ReplaceDir {
        path: PathBuf,
        attempts: u32,
        source: std::io::Error,
    },

    #[error("failed to remove '{path}' after {attempts} attempts: {source}")]
    Remove {
        path: PathBuf,
        attempts: u32,
        source: std::io::Error,
    },

    #[error("path not found: {0}")]
    NotFound(PathBuf),

    #[error("'{path}' did not settle within {waited:?}")]
    Unstable { path: PathBuf, waited: Duration },
}

pub type Result<T> = std::result::Result<T, Error>;
