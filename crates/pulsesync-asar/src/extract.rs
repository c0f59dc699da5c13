//! Extraction of a whole archive into a directory.
//!
//! Everything is written into a staging directory beside the destination and
//! moved into place once the last entry succeeds, so a failed extraction never
//! leaves a half-populated destination behind.
//!
//! # Platform Behavior
//!
//! **Unix**: executable entries get mode `0o755`.
//!
//! **Windows**: the executable flag is ignored. Links become file or directory
//! symlinks depending on what their target is in the header.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use pulsesync_fs::StagingDir;
use pulsesync_verify::{Sha256Hasher, VerifiedReader};

use crate::archive::Archive;
use crate::entry::{ArchiveReport, Entry, EntryKind};
use crate::error::{Error, Result};
use crate::options::{ExtractOptions, Progress};
use crate::sanitize;

/// Open `archive` and extract it into `destination`.
pub fn extract_archive(
    archive: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<ArchiveReport> {
    extract(&Archive::open(archive)?, destination, options)
}

pub fn extract(
    archive: &Archive,
    destination: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<ArchiveReport> {
    let destination = destination.as_ref();
    let entries = archive.entries()?;
    let total_bytes: u64 = entries.iter().filter(|e| e.is_file()).map(|e| e.size).sum();

    let staging = StagingDir::new_beside(destination)?;
    let mut bytes_processed = 0u64;

    for entry in &entries {
        let target = staging.path().join(&entry.path);
        match &entry.kind {
            EntryKind::Directory => {
                fs::create_dir_all(&target).map_err(|source| Error::DirectoryCreationFailed {
                    path: target.clone(),
                    source,
                })?;
            }
            EntryKind::File => {
                ensure_parent(&target)?;
                write_file(archive, entry, &target, options)?;
                bytes_processed += entry.size;
                options.report(Progress {
                    bytes_processed,
                    total_bytes,
                    current_file: entry.path.clone(),
                });
            }
            EntryKind::Link { target: link } => {
                ensure_parent(&target)?;
                create_link(archive, entry, link, &target)?;
            }
        }
    }

    let destination = staging.commit(options.replace)?;
    tracing::debug!(
        archive = %archive.path().display(),
        destination = %destination.display(),
        entries = entries.len(),
        bytes = total_bytes,
        "extracted archive"
    );

    Ok(ArchiveReport {
        destination,
        entry_count: entries.len(),
        total_bytes,
        entries,
    })
}

fn ensure_parent(target: &Path) -> Result<()> {
    match target.parent() {
        Some(parent) if !parent.exists() => {
            fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

fn write_file(
    archive: &Archive,
    entry: &Entry,
    target: &Path,
    options: &ExtractOptions,
) -> Result<()> {
    let node = archive.file_node(&entry.path)?;
    let reader = archive.open_entry(&entry.path)?;
    let failed = |source: io::Error| Error::ExtractionFailed {
        path: target.to_path_buf(),
        source,
    };
    let mut out = File::create(target).map_err(failed)?;

    match node.integrity.as_ref().filter(|_| options.verify_integrity) {
        Some(integrity) => {
            let mut verified = VerifiedReader::new(reader, Sha256Hasher::new());
            let copied = io::copy(&mut verified, &mut out).map_err(failed)?;
            check_size(entry, copied)?;
            verified
                .finish_hex(&integrity.hash)
                .map_err(|source| Error::IntegrityMismatch {
                    path: entry.path.clone(),
                    source,
                })?;
        }
        None => {
            let mut reader = reader;
            let copied = io::copy(&mut reader, &mut out).map_err(failed)?;
            check_size(entry, copied)?;
        }
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if entry.executable {
            fs::set_permissions(target, fs::Permissions::from_mode(0o755)).map_err(failed)?;
        }
    }

    Ok(())
}

fn check_size(entry: &Entry, copied: u64) -> Result<()> {
    if copied != entry.size {
        return Err(Error::Corrupted(format!(
            "'{}' is truncated: {copied} of {} bytes",
            entry.path.display(),
            entry.size
        )));
    }
    Ok(())
}

fn create_link(archive: &Archive, entry: &Entry, link: &str, target: &Path) -> Result<()> {
    let relative = sanitize::link_target(&entry.path, link)?;
    let failed = |source: io::Error| Error::LinkCreationFailed {
        link: target.to_path_buf(),
        target: relative.clone(),
        source,
    };

    #[cfg(unix)]
    {
        let _ = archive;
        std::os::unix::fs::symlink(&relative, target).map_err(failed)?;
    }

    #[cfg(windows)]
    {
        let points_at_dir = matches!(
            archive.node(link),
            Ok(crate::header::Node::Directory { .. })
        );
        if points_at_dir {
            std::os::windows::fs::symlink_dir(&relative, target).map_err(failed)?;
        } else {
            std::os::windows::fs::symlink_file(&relative, target).map_err(failed)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header;
    use tempfile::tempdir;

    fn archive_with(dir: &Path, json: &str, data: &[u8]) -> Archive {
        let path = dir.join("app.asar");
        let mut bytes = header::encode(json);
        bytes.extend_from_slice(data);
        fs::write(&path, bytes).unwrap();
        Archive::open(path).unwrap()
    }

    #[test]
    fn extracts_tree() {
        let dir = tempdir().unwrap();
        let archive = archive_with(
            dir.path(),
            r#"{"files":{"lib":{"files":{"main.js":{"size":5,"offset":"0","executable":true}}},"package.json":{"size":2,"offset":"5"}}}"#,
            b"hello{}",
        );
        let destination = dir.path().join("app");

        let report = extract(&archive, &destination, &ExtractOptions::new()).unwrap();
        assert_eq!(report.entry_count, 3);
        assert_eq!(report.total_bytes, 7);
        assert_eq!(fs::read(destination.join("lib/main.js")).unwrap(), b"hello");
        assert_eq!(fs::read(destination.join("package.json")).unwrap(), b"{}");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(destination.join("lib/main.js")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn integrity_mismatch_leaves_no_destination() {
        let dir = tempdir().unwrap();
        let archive = archive_with(
            dir.path(),
            r#"{"files":{"a.txt":{"size":5,"offset":"0","integrity":{"algorithm":"SHA256","hash":"0000000000000000000000000000000000000000000000000000000000000000","blockSize":4194304,"blocks":[]}}}}"#,
            b"hello",
        );
        let destination = dir.path().join("app");

        let result = extract(&archive, &destination, &ExtractOptions::new());
        assert!(matches!(result, Err(Error::IntegrityMismatch { .. })));
        assert!(!destination.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        let unchecked = ExtractOptions::new().verify_integrity(false);
        extract(&archive, &destination, &unchecked).unwrap();
        assert_eq!(fs::read(destination.join("a.txt")).unwrap(), b"hello");
    }

    #[test]
    fn replaces_existing_destination() {
        let dir = tempdir().unwrap();
        let header = r#"{"files":{"a.txt":{"size":1,"offset":"0"}}}"#;
        let archive = archive_with(dir.path(), header, b"x");
        let destination = dir.path().join("app");
        fs::create_dir_all(destination.join("stale")).unwrap();

        extract(&archive, &destination, &ExtractOptions::new()).unwrap();
        assert!(!destination.join("stale").exists());
        assert!(destination.join("a.txt").exists());
    }

    #[test]
    fn reports_progress() {
        use std::sync::{Arc, Mutex};

        let dir = tempdir().unwrap();
        let archive = archive_with(
            dir.path(),
            r#"{"files":{"a":{"size":1,"offset":"0"},"b":{"size":3,"offset":"1"}}}"#,
            b"xyyy",
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let options = ExtractOptions::new().on_progress(Arc::new(move |p: Progress| {
            sink.lock().unwrap().push(p.bytes_processed);
        }));

        extract(&archive, dir.path().join("app"), &options).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 4]);
    }

    #[cfg(unix)]
    #[test]
    fn links_resolve_inside_destination() {
        let dir = tempdir().unwrap();
        let archive = archive_with(
            dir.path(),
            r#"{"files":{"bin":{"files":{"tool":{"link":"lib/tool.js"}}},"lib":{"files":{"tool.js":{"size":2,"offset":"0"}}}}}"#,
            b"ok",
        );
        let destination = dir.path().join("app");
        extract(&archive, &destination, &ExtractOptions::new()).unwrap();

        let link = destination.join("bin/tool");
        assert_eq!(fs::read_link(&link).unwrap(), Path::new("../lib/tool.js"));
        assert_eq!(fs::read(&link).unwrap(), b"ok");
    }

    #[test]
    fn escaping_link_is_rejected() {
        let dir = tempdir().unwrap();
        let header = r#"{"files":{"evil":{"link":"../../etc/passwd"}}}"#;
        let archive = archive_with(dir.path(), header, b"");
        let result = extract(&archive, dir.path().join("app"), &ExtractOptions::new());
        assert!(matches!(result, Err(Error::LinkEscape { .. })));
    }
}
