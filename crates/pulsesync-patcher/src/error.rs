use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;
use crate::inject::{InjectError, Role};
use crate::locate::LocateError;

/// Where in the pipeline a run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchStage {
    Idle,
    Locating,
    BackingUp,
    Extracting,
    Searching(Role),
    Injecting(Role),
    Repackaging,
    ReconcilingHash,
    CleaningUp,
    Restoring,
    Inspecting,
}

impl fmt::Display for PatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchStage::Idle => f.write_str("idle"),
            PatchStage::Locating => f.write_str("locating application"),
            PatchStage::BackingUp => f.write_str("backing up archive"),
            PatchStage::Extracting => f.write_str("extracting archive"),
            PatchStage::Searching(role) => write!(f, "searching for {role}"),
            PatchStage::Injecting(role) => write!(f, "injecting {role}"),
            PatchStage::Repackaging => f.write_str("repackaging archive"),
            PatchStage::ReconcilingHash => f.write_str("reconciling manifest hash"),
            PatchStage::CleaningUp => f.write_str("cleaning up"),
            PatchStage::Restoring => f.write_str("restoring backup"),
            PatchStage::Inspecting => f.write_str("inspecting archive"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("another patch operation is already running")]
    Busy,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to prepare injected code: {0}")]
    Payload(#[source] InjectError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("failed to back up '{path}': {source}")]
    Backup {
        path: PathBuf,
        source: pulsesync_fs::Error,
    },

    #[error("backing up '{path}' did not finish within {timeout:?}")]
    BackupTimeout { path: PathBuf, timeout: Duration },

    #[error("no backup at '{0}'")]
    BackupMissing(PathBuf),

    #[error("failed to extract '{path}': {source}")]
    Extraction {
        path: PathBuf,
        source: pulsesync_asar::Error,
    },

    #[error("extracted tree at '{path}' is incomplete: {reason}")]
    ExtractionIncomplete { path: PathBuf, reason: String },

    #[error("{role} '{name}' not found under '{root}'")]
    TargetNotFound {
        role: Role,
        name: String,
        root: PathBuf,
    },

    #[error("search for {role} failed: {source}")]
    Search {
        role: Role,
        source: pulsesync_fs::Error,
    },

    #[error("failed to inject {role}: {source}")]
    Inject { role: Role, source: InjectError },

    #[error("failed to pack '{path}': {source}")]
    Pack {
        path: PathBuf,
        source: pulsesync_asar::Error,
    },

    #[error("restoring '{path}' did not finish within {timeout:?}")]
    RestoreTimeout { path: PathBuf, timeout: Duration },

    #[error("failed to restore '{path}': {source}")]
    Restore {
        path: PathBuf,
        source: pulsesync_fs::Error,
    },

    #[error("failed to inspect '{path}': {source}")]
    Inspect {
        path: PathBuf,
        source: pulsesync_asar::Error,
    },

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PatchError {
    pub fn stage(&self) -> PatchStage {
        match self {
            PatchError::Busy
            | PatchError::Config(_)
            | PatchError::Payload(_)
            | PatchError::Task(_) => PatchStage::Idle,
            PatchError::Locate(_) => PatchStage::Locating,
            PatchError::Backup { .. } | PatchError::BackupTimeout { .. } => PatchStage::BackingUp,
            PatchError::BackupMissing(_)
            | PatchError::Restore { .. }
            | PatchError::RestoreTimeout { .. } => PatchStage::Restoring,
            PatchError::Extraction { .. } | PatchError::ExtractionIncomplete { .. } => {
                PatchStage::Extracting
            }
            PatchError::TargetNotFound { role, .. } | PatchError::Search { role, .. } => {
                PatchStage::Searching(*role)
            }
            PatchError::Inject { role, .. } => PatchStage::Injecting(*role),
            PatchError::Pack { .. } => PatchStage::Repackaging,
            PatchError::Inspect { .. } => PatchStage::Inspecting,
        }
    }
}

/// Removing the scratch directory failed. The patched archive is already in
/// place, so this never fails the run.
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("failed to remove scratch directory: {0}")]
    Remove(#[from] pulsesync_fs::Error),

    #[error("removing '{path}' did not finish within {timeout:?}")]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("cleanup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
