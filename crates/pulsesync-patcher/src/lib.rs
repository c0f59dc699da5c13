//! Patches an Electron application's `app.asar` so the companion app can
//! observe playback and push themes into it.
//!
//! One run backs the archive up to `app.asar.copy`, extracts it into a scratch
//! directory, injects code into the entry script, config and event handler
//! found there, repacks the archive and, where the platform embeds one,
//! rewrites the archive hash in the bundle manifest.
//!
//! ```no_run
//! use std::sync::Arc;
//! use pulsesync_patcher::{JsonFileSettings, Patcher, PatcherConfig};
//!
//! # async fn run() -> Result<(), pulsesync_patcher::PatchError> {
//! let settings = Arc::new(JsonFileSettings::new("settings.json"));
//! let patcher = Patcher::new(PatcherConfig::default(), settings)?;
//! let report = patcher.patch().await?;
//! println!("repacked {} entries", report.archive.entry_count);
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod inject;
pub mod locate;
pub mod manifest;
mod patcher;
pub mod settings;

pub use config::{ConfigError, HashSubject, PatcherConfig};
pub use error::{CleanupError, PatchError, PatchStage};
pub use inject::{Injector, Outcome, Role};
pub use locate::{FixedLocator, InstallLocator, Locate, LocateError, TargetApplication};
pub use manifest::{HashOutcome, HashReconcileError, IntegrityRecord};
pub use patcher::{PatchReport, PatchStatus, Patcher, ProgressCallback, UnpatchReport};
pub use pulsesync_asar::Progress;
pub use settings::{JsonFileSettings, MemorySettings, SettingsError, SettingsStore};
