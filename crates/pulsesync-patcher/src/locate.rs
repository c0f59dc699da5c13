use std::path::{Path, PathBuf};

use crate::config::PatcherConfig;

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(&'static str),

    #[error("application not found; looked in: {}", format_candidates(.0))]
    NotFound(Vec<PathBuf>),

    #[error("no archive at '{0}'")]
    ArchiveMissing(PathBuf),
}

fn format_candidates(candidates: &[PathBuf]) -> String {
    candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Finds the directory holding the target application's resource archive.
pub trait Locate: Send + Sync {
    fn locate(&self) -> Result<PathBuf, LocateError>;
}

/// Looks in the platform's default install locations.
#[derive(Clone, Debug, Default)]
pub struct InstallLocator;

impl InstallLocator {
    pub fn candidates() -> Result<Vec<PathBuf>, LocateError> {
        #[cfg(target_os = "windows")]
        {
            let local = std::env::var_os("LOCALAPPDATA")
                .map(PathBuf::from)
                .or_else(|| home::home_dir().map(|h| h.join("AppData").join("Local")))
                .ok_or(LocateError::NotFound(Vec::new()))?;
            Ok(vec![local.join("Programs").join("YandexMusic").join("resources")])
        }
        #[cfg(target_os = "macos")]
        {
            let bundle = Path::new("Яндекс Музыка.app").join("Contents").join("Resources");
            let mut candidates = vec![Path::new("/Applications").join(&bundle)];
            if let Some(home) = home::home_dir() {
                candidates.push(home.join("Applications").join(&bundle));
            }
            Ok(candidates)
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            Err(LocateError::UnsupportedPlatform(std::env::consts::OS))
        }
    }
}

impl Locate for InstallLocator {
    fn locate(&self) -> Result<PathBuf, LocateError> {
        let candidates = Self::candidates()?;
        match candidates.iter().position(|dir| dir.is_dir()) {
            Some(found) => Ok(candidates[found].clone()),
            None => Err(LocateError::NotFound(candidates)),
        }
    }
}

/// Always answers with the same directory.
#[derive(Clone, Debug)]
pub struct FixedLocator(pub PathBuf);

impl Locate for FixedLocator {
    fn locate(&self) -> Result<PathBuf, LocateError> {
        if self.0.is_dir() {
            Ok(self.0.clone())
        } else {
            Err(LocateError::NotFound(vec![self.0.clone()]))
        }
    }
}

/// Paths one patch run works with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetApplication {
    pub root: PathBuf,
    pub archive: PathBuf,
    pub scratch: PathBuf,
    pub backup: PathBuf,
    pub manifest: Option<PathBuf>,
}

impl TargetApplication {
    pub fn resolve(root: impl AsRef<Path>, config: &PatcherConfig) -> Result<Self, LocateError> {
        let root = root.as_ref().to_path_buf();
        let archive = root.join(&config.targets.archive);
        if !archive.is_file() {
            return Err(LocateError::ArchiveMissing(archive));
        }

        Ok(Self {
            scratch: root.join(&config.targets.scratch_dir),
            backup: pulsesync_fs::backup_path(&archive, &config.backup_suffix),
            manifest: config
                .manifest_path
                .clone()
                .or_else(|| default_manifest(&root)),
            archive,
            root,
        })
    }
}

#[cfg(target_os = "macos")]
fn default_manifest(root: &Path) -> Option<PathBuf> {
    root.parent().map(|contents| contents.join("Info.plist"))
}

#[cfg(not(target_os = "macos"))]
fn default_manifest(_root: &Path) -> Option<PathBuf> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolves_layout_under_root() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("app.asar"), b"").unwrap();

        let config = PatcherConfig::default().manifest_path(dir.path().join("Info.plist"));
        let target = TargetApplication::resolve(dir.path(), &config).unwrap();
        assert_eq!(target.archive, dir.path().join("app.asar"));
        assert_eq!(target.scratch, dir.path().join("app"));
        assert_eq!(target.backup, dir.path().join("app.asar.copy"));
        assert_eq!(target.manifest, Some(dir.path().join("Info.plist")));
    }

    #[test]
    fn missing_archive_is_reported() {
        let dir = tempdir().unwrap();
        let result = TargetApplication::resolve(dir.path(), &PatcherConfig::default());
        assert!(matches!(result, Err(LocateError::ArchiveMissing(_))));
    }

    #[test]
    fn fixed_locator_requires_directory() {
        let dir = tempdir().unwrap();
        assert_eq!(FixedLocator(dir.path().to_path_buf()).locate().unwrap(), dir.path());
        assert!(matches!(
            FixedLocator(dir.path().join("absent")).locate(),
            Err(LocateError::NotFound(_))
        ));
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    #[test]
    fn other_platforms_are_unsupported() {
        assert!(matches!(
            InstallLocator.locate(),
            Err(LocateError::UnsupportedPlatform(_))
        ));
    }
}
