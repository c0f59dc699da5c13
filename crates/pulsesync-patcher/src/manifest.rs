//! Keeping the bundle manifest's archive hash in step with the archive.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

use crate::config::HashSubject;

static HASH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<key>hash</key>\s*<string>([^<]+)</string>").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum HashReconcileError {
    #[error("failed to read archive header: {0}")]
    Archive(#[from] pulsesync_asar::Error),

    #[error("failed to hash '{path}': {source}")]
    Hash {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to update manifest: {0}")]
    Manifest(#[from] pulsesync_fs::Error),

    #[error("failed to record previous hash: {0}")]
    Settings(#[from] crate::settings::SettingsError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrityRecord {
    pub manifest: PathBuf,
    pub old_hash: String,
    pub new_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HashOutcome {
    Updated(IntegrityRecord),
    /// The manifest has no hash entry; nothing was written.
    PatternMissing { manifest: PathBuf },
    /// No manifest applies to this platform.
    Skipped,
}

pub fn archive_hash(archive: &Path, subject: HashSubject) -> Result<String, HashReconcileError> {
    match subject {
        HashSubject::Header => Ok(pulsesync_asar::Archive::open(archive)?.header_hash()),
        HashSubject::Archive => {
            pulsesync_verify::sha256_file(archive).map_err(|source| HashReconcileError::Hash {
                path: archive.to_path_buf(),
                source,
            })
        }
    }
}

/// Swap the first hash entry for `new_hash`. `None` when there is no entry;
/// otherwise the previous value and the rewritten text.
pub fn replace_hash(content: &str, new_hash: &str) -> Option<(String, String)> {
    let old = HASH_PATTERN.captures(content)?.get(1)?.as_str().to_string();
    let replacement = format!("<key>hash</key>\n<string>{new_hash}</string>");
    let updated = HASH_PATTERN.replacen(content, 1, NoExpand(&replacement)).into_owned();
    Some((old, updated))
}

/// Recompute the archive hash and write it into `manifest`.
pub fn reconcile(
    archive: &Path,
    manifest: &Path,
    subject: HashSubject,
) -> Result<HashOutcome, HashReconcileError> {
    let new_hash = archive_hash(archive, subject)?;
    let content = pulsesync_fs::read_to_string(manifest)?;

    let Some((old_hash, updated)) = replace_hash(&content, &new_hash) else {
        tracing::warn!(manifest = %manifest.display(), "hash entry not found in manifest");
        return Ok(HashOutcome::PatternMissing {
            manifest: manifest.to_path_buf(),
        });
    };

    if updated != content {
        let options = pulsesync_fs::AtomicWriteOptions::new();
        pulsesync_fs::atomic_write(manifest, updated.as_bytes(), options)?;
    }
    tracing::info!(
        manifest = %manifest.display(),
        old = %old_hash,
        new = %new_hash,
        "manifest hash updated"
    );

    Ok(HashOutcome::Updated(IntegrityRecord {
        manifest: manifest.to_path_buf(),
        old_hash,
        new_hash,
    }))
}
