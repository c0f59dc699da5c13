//! The patch pipeline.
//!
//! ```text
//! Idle -> BackingUp -> Extracting
//!      -> Searching(EntryScript)  -> Injecting(EntryScript)
//!      -> Searching(Config)       -> Injecting(Config)
//!      -> Searching(EventHandler) -> Injecting(EventHandler)
//!      -> Repackaging -> ReconcilingHash -> CleaningUp -> Done
//! ```
//!
//! A missing entry script or config is logged and skipped. A missing event
//! handler fails the run before repackaging, leaving the archive untouched and
//! the scratch directory in place for inspection.
//!
//! The backup and the remembered manifest hash describe the unpatched
//! application. Once the archive carries the injected code and a backup
//! exists, later runs leave both alone.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pulsesync_asar::{ArchiveReport, ExtractOptions, PackOptions, PackReport, Progress};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::PatcherConfig;
use crate::error::{CleanupError, PatchError, PatchStage};
use crate::inject::{ENTRY_SENTINEL, Injector, LISTENER_SENTINEL, Outcome, Role};
use crate::locate::{FixedLocator, InstallLocator, Locate, TargetApplication};
use crate::manifest::{self, HashOutcome, HashReconcileError};
use crate::settings::SettingsStore;

#[derive(Debug)]
pub struct PatchReport {
    pub target: TargetApplication,
    /// False when an existing backup of the unpatched archive was kept.
    pub backed_up: bool,
    pub extracted: usize,
    pub injections: Vec<(Role, Outcome)>,
    pub archive: PackReport,
    pub integrity: Result<HashOutcome, HashReconcileError>,
    pub cleanup: Result<(), CleanupError>,
}

impl PatchReport {
    pub fn outcome(&self, role: Role) -> Option<&Outcome> {
        self.injections
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, outcome)| outcome)
    }

    /// Whether the non-fatal tail of the run succeeded too.
    pub fn is_clean(&self) -> bool {
        self.integrity.is_ok() && self.cleanup.is_ok()
    }
}

#[derive(Debug)]
pub struct UnpatchReport {
    pub archive: PathBuf,
    pub backup: PathBuf,
    pub integrity: Result<HashOutcome, HashReconcileError>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchStatus {
    pub archive: PathBuf,
    pub backup_exists: bool,
    pub scratch_exists: bool,
    pub entry_script: Option<PathBuf>,
    pub entry_patched: bool,
    pub event_handler: Option<PathBuf>,
    pub event_handler_patched: bool,
}

impl PatchStatus {
    pub fn is_patched(&self) -> bool {
        self.entry_patched || self.event_handler_patched
    }
}

pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

pub struct Patcher {
    config: PatcherConfig,
    locator: Arc<dyn Locate>,
    settings: Arc<dyn SettingsStore>,
    injector: Injector,
    on_progress: Option<ProgressCallback>,
    running: Mutex<()>,
}

impl Patcher {
    pub fn new(
        config: PatcherConfig,
        settings: Arc<dyn SettingsStore>,
    ) -> Result<Self, PatchError> {
        let locator: Arc<dyn Locate> = match &config.install_path {
            Some(path) => Arc::new(FixedLocator(path.clone())),
            None => Arc::new(InstallLocator),
        };
        let injector =
            Injector::new(&config.control_plane.base_url()).map_err(PatchError::Payload)?;

        Ok(Self {
            config,
            locator,
            settings,
            injector,
            on_progress: None,
            running: Mutex::new(()),
        })
    }

    /// Build from a TOML file merged with the environment.
    pub fn load(
        config_path: Option<&Path>,
        settings: Arc<dyn SettingsStore>,
    ) -> Result<Self, PatchError> {
        Self::new(PatcherConfig::load(config_path)?, settings)
    }

    pub fn with_locator(mut self, locator: impl Locate + 'static) -> Self {
        self.locator = Arc::new(locator);
        self
    }

    /// Observe extraction as it writes each file.
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn config(&self) -> &PatcherConfig {
        &self.config
    }

    pub fn target(&self) -> Result<TargetApplication, PatchError> {
        let root = self.locator.locate()?;
        Ok(TargetApplication::resolve(root, &self.config)?)
    }

    pub async fn patch(&self) -> Result<PatchReport, PatchError> {
        let _running = self.running.try_lock().map_err(|_| PatchError::Busy)?;
        let target = self.target()?;
        info!(archive = %target.archive.display(), "patch started");

        let result = self.run_patch(target).await;
        match &result {
            Ok(report) => info!(
                archive = %report.target.archive.display(),
                clean = report.is_clean(),
                "patch finished"
            ),
            Err(e) => error!(stage = %e.stage(), error = %e, "patch failed"),
        }
        result
    }

    async fn run_patch(&self, target: TargetApplication) -> Result<PatchReport, PatchError> {
        let timeout = self.config.io_timeout();

        enter(PatchStage::BackingUp, &target.backup);
        let repatch = self.is_repatch(&target).await?;
        if repatch {
            info!(
                backup = %target.backup.display(),
                "archive already patched, keeping existing backup"
            );
        } else {
            let archive = target.archive.clone();
            let suffix = self.config.backup_suffix.clone();
            let task = blocking(move || {
                pulsesync_fs::backup_file(&archive, &suffix).map_err(|source| PatchError::Backup {
                    path: archive.clone(),
                    source,
                })
            });
            let backup = bounded(timeout, task).await.unwrap_or_else(|| {
                Err(PatchError::BackupTimeout {
                    path: target.archive.clone(),
                    timeout,
                })
            })?;
            info!(backup = %backup.display(), "archive backed up");
        }

        enter(PatchStage::Extracting, &target.scratch);
        let extracted = {
            let archive = target.archive.clone();
            let scratch = target.scratch.clone();
            let options = self.extract_options();
            blocking(move || extract(&archive, &scratch, &options)).await?
        };
        info!(entries = extracted.entry_count, bytes = extracted.total_bytes, "archive extracted");

        let injections = {
            let scratch = target.scratch.clone();
            let injector = self.injector.clone();
            let targets = self.config.targets.clone();
            blocking(move || {
                Role::ALL
                    .into_iter()
                    .map(|role| {
                        inject_role(&injector, &targets, &scratch, role)
                            .map(|outcome| (role, outcome))
                    })
                    .collect::<Result<Vec<_>, PatchError>>()
            })
            .await?
        };

        enter(PatchStage::Repackaging, &target.archive);
        let packed = {
            let scratch = target.scratch.clone();
            let archive = target.archive.clone();
            let options = PackOptions::new().unpacked(extracted.unpacked_paths());
            let stability = self.config.stability_options();
            blocking(move || {
                let report = pulsesync_asar::pack(&scratch, &archive, &options).map_err(|source| {
                    PatchError::Pack {
                        path: archive.clone(),
                        source,
                    }
                })?;
                pulsesync_fs::wait_for_stable(&archive, stability).map_err(|e| PatchError::Pack {
                    path: archive.clone(),
                    source: e.into(),
                })?;
                Ok(report)
            })
            .await?
        };
        info!(
            archive = %packed.archive.display(),
            entries = packed.entry_count,
            "archive repacked"
        );

        let integrity = self.reconcile(&target, !repatch).await;
        let cleanup = self.cleanup(&target.scratch).await;

        Ok(PatchReport {
            target,
            backed_up: !repatch,
            extracted: extracted.entry_count,
            injections,
            archive: packed,
            integrity,
            cleanup,
        })
    }

    /// A backup exists and the live archive already carries injected code, so
    /// the backup is the only unpatched copy left. An unreadable archive is
    /// left for extraction to report.
    async fn is_repatch(&self, target: &TargetApplication) -> Result<bool, PatchError> {
        if !target.backup.is_file() {
            return Ok(false);
        }
        let target = target.clone();
        let targets = self.config.targets.clone();
        blocking(move || Ok(inspect(&target, &targets).is_ok_and(|status| status.is_patched())))
            .await
    }

    fn extract_options(&self) -> ExtractOptions {
        let forward = self.on_progress.clone();
        ExtractOptions::new()
            .replace(self.config.replace_options())
            .on_progress(Arc::new(move |progress: Progress| {
                debug!(
                    file = %progress.current_file.display(),
                    percent = progress.percentage(),
                    "extracting"
                );
                if let Some(forward) = &forward {
                    forward(progress);
                }
            }))
    }

    /// Rewrite the manifest hash. With `remember`, the hash being replaced is
    /// stored under the configured settings key.
    async fn reconcile(
        &self,
        target: &TargetApplication,
        remember: bool,
    ) -> Result<HashOutcome, HashReconcileError> {
        let Some(manifest_path) = target.manifest.clone() else {
            debug!("no manifest for this platform, skipping hash update");
            return Ok(HashOutcome::Skipped);
        };
        enter(PatchStage::ReconcilingHash, &manifest_path);

        let archive = target.archive.clone();
        let subject = self.config.hash_subject;
        let outcome = tokio::task::spawn_blocking(move || {
            manifest::reconcile(&archive, &manifest_path, subject)
        })
        .await
        .unwrap_or_else(|e| {
            Err(HashReconcileError::Hash {
                path: target.archive.clone(),
                source: std::io::Error::other(e),
            })
        });

        let outcome = match outcome {
            Ok(HashOutcome::Updated(record)) if remember => {
                self.settings
                    .set(&self.config.settings_key, record.old_hash.clone().into())
                    .map(|()| HashOutcome::Updated(record))
                    .map_err(HashReconcileError::from)
            }
            other => other,
        };
        if let Err(e) = &outcome {
            warn!(error = %e, "manifest hash not updated");
        }
        outcome
    }

    async fn cleanup(&self, scratch: &Path) -> Result<(), CleanupError> {
        enter(PatchStage::CleaningUp, scratch);
        let timeout = self.config.io_timeout();
        let options = self.config.replace_options();
        let path = scratch.to_path_buf();

        let removal =
            tokio::task::spawn_blocking(move || pulsesync_fs::remove_dir_all(&path, options));
        let result = match tokio::time::timeout(timeout, removal).await {
            Ok(joined) => joined
                .map_err(CleanupError::from)
                .and_then(|removed| removed.map_err(CleanupError::from)),
            Err(_) => Err(CleanupError::Timeout {
                path: scratch.to_path_buf(),
                timeout,
            }),
        };
        if let Err(e) = &result {
            warn!(path = %scratch.display(), error = %e, "scratch directory left behind");
        }
        result
    }

    /// Put the backed-up archive back and re-sync the manifest with it.
    pub async fn unpatch(&self) -> Result<UnpatchReport, PatchError> {
        let _running = self.running.try_lock().map_err(|_| PatchError::Busy)?;
        let target = self.target()?;
        if !target.backup.is_file() {
            return Err(PatchError::BackupMissing(target.backup));
        }

        enter(PatchStage::Restoring, &target.archive);
        let timeout = self.config.io_timeout();
        let backup = target.backup.clone();
        let archive = target.archive.clone();
        let stability = self.config.stability_options();
        bounded(timeout, blocking(move || {
            pulsesync_fs::copy_file(&backup, &archive)
                .and_then(|_| pulsesync_fs::wait_for_stable(&archive, stability))
                .map(|_| ())
                .map_err(|source| PatchError::Restore {
                    path: archive.clone(),
                    source,
                })
        }))
        .await
        .unwrap_or_else(|| {
            Err(PatchError::RestoreTimeout {
                path: target.archive.clone(),
                timeout,
            })
        })?;
        info!(archive = %target.archive.display(), "archive restored from backup");

        let integrity = self.reconcile(&target, false).await;
        Ok(UnpatchReport {
            archive: target.archive,
            backup: target.backup,
            integrity,
        })
    }

    /// Inspect the installed archive without extracting it.
    pub async fn status(&self) -> Result<PatchStatus, PatchError> {
        let target = self.target()?;
        enter(PatchStage::Inspecting, &target.archive);
        let targets = self.config.targets.clone();
        blocking(move || inspect(&target, &targets)).await
    }
}

fn enter(stage: PatchStage, path: &Path) {
    debug!(stage = %stage, path = %path.display(), "entering stage");
}

async fn blocking<T, F>(f: F) -> Result<T, PatchError>
where
    F: FnOnce() -> Result<T, PatchError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// `None` when `task` outlives `timeout`. The blocking work itself keeps
/// running in the background.
async fn bounded<T>(timeout: Duration, task: impl Future<Output = T>) -> Option<T> {
    tokio::time::timeout(timeout, task).await.ok()
}

fn extract(
    archive: &Path,
    scratch: &Path,
    options: &ExtractOptions,
) -> Result<ArchiveReport, PatchError> {
    let failed = |source| PatchError::Extraction {
        path: archive.to_path_buf(),
        source,
    };
    if scratch.exists() {
        warn!(path = %scratch.display(), "replacing stale scratch directory");
    }
    let report = pulsesync_asar::extract_archive(archive, scratch, options).map_err(failed)?;
    check_extracted(&report)?;
    Ok(report)
}

/// Every entry the header lists must be on disk with its recorded size before
/// the tree is searched.
fn check_extracted(report: &ArchiveReport) -> Result<(), PatchError> {
    for entry in &report.entries {
        let path = report.target_of(entry);
        let incomplete = |reason: String| PatchError::ExtractionIncomplete {
            path: report.destination.clone(),
            reason,
        };
        let metadata = std::fs::symlink_metadata(&path)
            .map_err(|e| incomplete(format!("'{}': {e}", entry.path.display())))?;
        if entry.is_file() && metadata.len() != entry.size {
            return Err(incomplete(format!(
                "'{}' is {} bytes, expected {}",
                entry.path.display(),
                metadata.len(),
                entry.size
            )));
        }
    }
    Ok(())
}

fn inject_role(
    injector: &Injector,
    targets: &crate::config::Targets,
    scratch: &Path,
    role: Role,
) -> Result<Outcome, PatchError> {
    let name = role.file_name(targets);
    enter(PatchStage::Searching(role), scratch);
    let found = pulsesync_fs::find_file(scratch, name, role.skip(targets))
        .map_err(|source| PatchError::Search { role, source })?;

    let Some(path) = found else {
        if role.is_required() {
            return Err(PatchError::TargetNotFound {
                role,
                name: name.to_string(),
                root: scratch.to_path_buf(),
            });
        }
        warn!(role = %role, file = name, root = %scratch.display(), "target not found, skipping");
        return Ok(Outcome::NotFound);
    };

    enter(PatchStage::Injecting(role), &path);
    let outcome = injector
        .apply(role, &path)
        .map_err(|source| PatchError::Inject { role, source })?;
    match &outcome {
        Outcome::AlreadyApplied { path } => {
            info!(role = %role, path = %path.display(), "already patched, left as is")
        }
        Outcome::Substituted { path, count } => {
            info!(role = %role, path = %path.display(), substitutions = count, "flags updated")
        }
        Outcome::Injected { path } => info!(role = %role, path = %path.display(), "injected"),
        Outcome::NotFound => {}
    }
    Ok(outcome)
}

fn inspect(
    target: &TargetApplication,
    targets: &crate::config::Targets,
) -> Result<PatchStatus, PatchError> {
    let failed = |source| PatchError::Inspect {
        path: target.archive.clone(),
        source,
    };
    let archive = pulsesync_asar::Archive::open(&target.archive).map_err(failed)?;
    let entries = archive.entries().map_err(failed)?;

    let locate = |role: Role| {
        let skip = role.skip(targets);
        entries
            .iter()
            .filter(|e| e.is_file())
            .filter(|e| e.path.file_name().is_some_and(|n| n == role.file_name(targets)))
            .find(|e| {
                !e.path
                    .parent()
                    .into_iter()
                    .flat_map(Path::components)
                    .any(|c| skip.iter().any(|s| c.as_os_str() == s.as_str()))
            })
            .map(|e| e.path.clone())
    };
    let carries = |path: &Option<PathBuf>, sentinel: &str| -> Result<bool, PatchError> {
        match path {
            Some(path) => {
                let content = archive.read(path).map_err(failed)?;
                Ok(String::from_utf8_lossy(&content).contains(sentinel))
            }
            None => Ok(false),
        }
    };

    let entry_script = locate(Role::EntryScript);
    let event_handler = locate(Role::EventHandler);
    Ok(PatchStatus {
        archive: target.archive.clone(),
        backup_exists: target.backup.is_file(),
        scratch_exists: target.scratch.exists(),
        entry_patched: carries(&entry_script, ENTRY_SENTINEL)?,
        event_handler_patched: carries(&event_handler, LISTENER_SENTINEL)?,
        entry_script,
        event_handler,
    })
}
