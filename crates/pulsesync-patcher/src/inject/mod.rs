//! Locating the three target files in the scratch tree and rewriting them.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Targets;

mod payload;
mod transform;

pub use payload::{ENTRY_SENTINEL, LISTENER_SENTINEL, Payload};
pub use transform::{
    CONFIG_FLAGS, EVENTS_ANCHOR, Transform, append_entry_script, flip_config_flags,
    insert_track_listener,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    EntryScript,
    Config,
    EventHandler,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::EntryScript, Role::Config, Role::EventHandler];

    pub fn file_name<'a>(&self, targets: &'a Targets) -> &'a str {
        match self {
            Role::EntryScript => &targets.entry_script,
            Role::Config => &targets.config,
            Role::EventHandler => &targets.events,
        }
    }

    /// Directory names pruned from the search for this role.
    pub fn skip<'a>(&self, targets: &'a Targets) -> &'a [String] {
        match self {
            Role::EventHandler => &targets.events_skip,
            _ => &[],
        }
    }

    /// Whether the run fails when no file for this role exists.
    pub fn is_required(&self) -> bool {
        matches!(self, Role::EventHandler)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::EntryScript => "entry script",
            Role::Config => "config",
            Role::EventHandler => "event handler",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Injected { path: PathBuf },
    AlreadyApplied { path: PathBuf },
    /// Config flags flipped; `count` of them were present.
    Substituted { path: PathBuf, count: usize },
    NotFound,
}

impl Outcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Outcome::Injected { path }
            | Outcome::AlreadyApplied { path }
            | Outcome::Substituted { path, .. } => Some(path),
            Outcome::NotFound => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("failed to render payload: {0}")]
    Template(#[from] tera::Error),

    #[error(transparent)]
    Fs(#[from] pulsesync_fs::Error),

    #[error("anchor '{anchor}' not found in '{path}'")]
    AnchorMissing { path: PathBuf, anchor: &'static str },
}

/// Applies the transforms to files on disk. Every rewrite replaces the whole
/// file through a temporary sibling.
#[derive(Clone, Debug)]
pub struct Injector {
    payload: Payload,
}

impl Injector {
    pub fn new(base_url: &str) -> Result<Self, InjectError> {
        Ok(Self {
            payload: Payload::render(base_url)?,
        })
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn apply(&self, role: Role, path: &Path) -> Result<Outcome, InjectError> {
        match role {
            Role::EntryScript => self.entry_script(path),
            Role::Config => self.config(path),
            Role::EventHandler => self.event_handler(path),
        }
    }

    pub fn entry_script(&self, path: &Path) -> Result<Outcome, InjectError> {
        let content = pulsesync_fs::read_to_string(path)?;
        match append_entry_script(&content, &self.payload) {
            Transform::Changed(patched) => {
                write(path, &patched)?;
                Ok(Outcome::Injected { path: path.to_path_buf() })
            }
            _ => Ok(Outcome::AlreadyApplied { path: path.to_path_buf() }),
        }
    }

    pub fn config(&self, path: &Path) -> Result<Outcome, InjectError> {
        let content = pulsesync_fs::read_to_string(path)?;
        let (patched, count) = flip_config_flags(&content);
        if count > 0 {
            write(path, &patched)?;
        }
        Ok(Outcome::Substituted { path: path.to_path_buf(), count })
    }

    pub fn event_handler(&self, path: &Path) -> Result<Outcome, InjectError> {
        let content = pulsesync_fs::read_to_string(path)?;
        match insert_track_listener(&content, &self.payload) {
            Transform::Changed(patched) => {
                write(path, &patched)?;
                Ok(Outcome::Injected { path: path.to_path_buf() })
            }
            Transform::AlreadyApplied => Ok(Outcome::AlreadyApplied { path: path.to_path_buf() }),
            Transform::AnchorMissing => Err(InjectError::AnchorMissing {
                path: path.to_path_buf(),
                anchor: EVENTS_ANCHOR,
            }),
        }
    }
}

fn write(path: &Path, content: &str) -> Result<(), InjectError> {
    pulsesync_fs::atomic_write(path, content.as_bytes(), pulsesync_fs::AtomicWriteOptions::new())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn injector() -> Injector {
        Injector::new("http://127.0.0.1:2007").unwrap()
    }

    #[test]
    fn roles_map_to_configured_names() {
        let targets = Targets::default();
        assert_eq!(Role::EntryScript.file_name(&targets), "rumScript.js");
        assert_eq!(Role::Config.file_name(&targets), "config.js");
        assert_eq!(Role::EventHandler.file_name(&targets), "events.js");
        assert!(Role::Config.skip(&targets).is_empty());
        assert_eq!(Role::EventHandler.skip(&targets), ["node_modules", "constants"]);
        assert!(Role::EventHandler.is_required());
        assert!(!Role::EntryScript.is_required());
    }

    #[test]
    fn entry_script_file_is_patched_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rumScript.js");
        std::fs::write(&path, "").unwrap();

        let injector = injector();
        assert!(matches!(injector.entry_script(&path).unwrap(), Outcome::Injected { .. }));
        let once = std::fs::read_to_string(&path).unwrap();
        assert!(matches!(injector.entry_script(&path).unwrap(), Outcome::AlreadyApplied { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), once);
    }

    #[test]
    fn config_reports_substitutions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.js");
        std::fs::write(&path, "enableDevTools: false,\nenableWebSecurity: true,\n").unwrap();

        let outcome = injector().config(&path).unwrap();
        assert_eq!(outcome, Outcome::Substituted { path: path.clone(), count: 2 });
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "enableDevTools: true,\nenableWebSecurity: false,\n"
        );
    }

    #[test]
    fn event_handler_without_anchor_is_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.js");
        std::fs::write(&path, "module.exports = {};").unwrap();

        let result = injector().event_handler(&path);
        assert!(matches!(result, Err(InjectError::AnchorMissing { .. })));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "module.exports = {};");
    }
}
