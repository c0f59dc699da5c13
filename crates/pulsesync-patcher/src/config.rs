//! Patcher configuration.
//!
//! Defaults are merged with an optional TOML file and then with
//! `PULSESYNC_`-prefixed environment variables, where `__` separates nested
//! keys (`PULSESYNC_CONTROL_PLANE__PORT=2008`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use pulsesync_fs::{ReplaceDirOptions, StabilityOptions};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "PULSESYNC_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] figment::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatcherConfig {
    /// Directory holding the archive. Resolved per platform when unset.
    pub install_path: Option<PathBuf>,
    /// Manifest carrying the archive hash. Defaults to `../Info.plist` on macOS.
    pub manifest_path: Option<PathBuf>,
    pub control_plane: ControlPlane,
    pub targets: Targets,
    pub backup_suffix: String,
    pub settings_key: String,
    pub hash_subject: HashSubject,
    pub io_timeout_ms: u64,
    pub retry: Retry,
    pub readiness: Readiness,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            install_path: None,
            manifest_path: None,
            control_plane: ControlPlane::default(),
            targets: Targets::default(),
            backup_suffix: ".copy".to_string(),
            settings_key: "music.hash".to_string(),
            hash_subject: HashSubject::default(),
            io_timeout_ms: 60_000,
            retry: Retry::default(),
            readiness: Readiness::default(),
        }
    }
}

/// Loopback server the injected scripts talk to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlane {
    pub host: String,
    pub port: u16,
}

impl Default for ControlPlane {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2007,
        }
    }
}

impl ControlPlane {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Targets {
    pub archive: String,
    pub scratch_dir: String,
    pub entry_script: String,
    pub config: String,
    pub events: String,
    /// Directory names pruned while searching for the events script.
    pub events_skip: Vec<String>,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            archive: "app.asar".to_string(),
            scratch_dir: "app".to_string(),
            entry_script: "rumScript.js".to_string(),
            config: "config.js".to_string(),
            events: "events.js".to_string(),
            events_skip: vec!["node_modules".to_string(), "constants".to_string()],
        }
    }
}

/// What the manifest hash is computed over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashSubject {
    /// The archive's header JSON, as Electron's asar integrity check expects.
    #[default]
    Header,
    /// Every byte of the archive file.
    Archive,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Retry {
    pub count: u32,
    pub delay_ms: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            count: 5,
            delay_ms: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Readiness {
    pub poll_interval_ms: u64,
    pub stable_polls: u32,
    pub deadline_ms: u64,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            stable_polls: 2,
            deadline_ms: 10_000,
        }
    }
}

impl PatcherConfig {
    /// Defaults, then `path` if it exists, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn install_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_path = Some(path.into());
        self
    }

    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    pub fn hash_subject(mut self, subject: HashSubject) -> Self {
        self.hash_subject = subject;
        self
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn replace_options(&self) -> ReplaceDirOptions {
        ReplaceDirOptions::new()
            .retry_count(self.retry.count)
            .retry_delay(Duration::from_millis(self.retry.delay_ms))
    }

    pub fn stability_options(&self) -> StabilityOptions {
        StabilityOptions::new()
            .poll_interval(Duration::from_millis(self.readiness.poll_interval_ms))
            .stable_polls(self.readiness.stable_polls)
            .deadline(Duration::from_millis(self.readiness.deadline_ms))
    }
}
