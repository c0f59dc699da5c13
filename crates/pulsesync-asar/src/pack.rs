//! Packing a directory tree into an archive.
//!
//! Entries are laid out in name order, so packing the same tree twice yields
//! the same bytes and the same header hash.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use pulsesync_fs::primitives::atomic_write;
use pulsesync_verify::Sha256Hasher;

use crate::archive::unpacked_dir_for;
use crate::entry::PackReport;
use crate::error::{Error, Result};
use crate::header::{self, FileNode, Header, Node};
use crate::integrity;
use crate::options::PackOptions;
use crate::sanitize;

struct Packed {
    source: PathBuf,
    size: u64,
}

struct Layout<'a> {
    root: &'a Path,
    unpacked_dir: PathBuf,
    options: &'a PackOptions,
    packed: Vec<Packed>,
    offset: u64,
    entry_count: usize,
    unpacked_count: usize,
}

pub fn pack(
    source: impl AsRef<Path>,
    archive: impl AsRef<Path>,
    options: &PackOptions,
) -> Result<PackReport> {
    let source = source.as_ref();
    let archive = archive.as_ref();

    if !source.is_dir() {
        return Err(Error::PackFailed {
            path: source.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "source is not a directory"),
        });
    }

    let mut layout = Layout {
        root: source,
        unpacked_dir: unpacked_dir_for(archive),
        options,
        packed: Vec::new(),
        offset: 0,
        entry_count: 0,
        unpacked_count: 0,
    };
    let files = layout.directory(source)?;
    let json = serde_json::to_string(&Header { files }).map_err(Error::InvalidHeader)?;

    let mut tmp = atomic_write::temp_sibling(archive)?;
    let write_failed = |source: io::Error| Error::PackFailed {
        path: archive.to_path_buf(),
        source,
    };
    {
        let mut out = io::BufWriter::new(tmp.as_file_mut());
        out.write_all(&header::encode(&json)).map_err(write_failed)?;
        for file in &layout.packed {
            append(&mut out, file)?;
        }
        out.flush().map_err(write_failed)?;
    }
    atomic_write::finish(tmp, archive, atomic_write::Options::new().sync(true))?;

    let report = PackReport {
        archive: archive.to_path_buf(),
        entry_count: layout.entry_count,
        packed_bytes: layout.offset,
        unpacked_count: layout.unpacked_count,
        header_hash: Sha256Hasher::hex_digest(json.as_bytes()),
    };
    tracing::debug!(
        archive = %archive.display(),
        entries = report.entry_count,
        bytes = report.packed_bytes,
        unpacked = report.unpacked_count,
        "packed archive"
    );
    Ok(report)
}

fn append<W: Write>(out: &mut W, file: &Packed) -> Result<()> {
    let failed = |source: io::Error| Error::PackFailed {
        path: file.source.clone(),
        source,
    };
    let input = File::open(&file.source).map_err(failed)?;
    let copied = io::copy(&mut io::Read::take(input, file.size), out).map_err(failed)?;
    if copied != file.size {
        return Err(failed(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("file shrank from {} to {copied} bytes while packing", file.size),
        )));
    }
    Ok(())
}

impl Layout<'_> {
    fn directory(&mut self, dir: &Path) -> Result<BTreeMap<String, Node>> {
        let read_failed = |source: io::Error| Error::PackFailed {
            path: dir.to_path_buf(),
            source,
        };
        let mut children: Vec<_> = fs::read_dir(dir)
            .map_err(read_failed)?
            .collect::<io::Result<_>>()
            .map_err(read_failed)?;
        children.sort_by_key(|entry| entry.file_name());

        let mut files = BTreeMap::new();
        for child in children {
            let path = child.path();
            let name = child
                .file_name()
                .into_string()
                .map_err(|_| Error::UnsupportedEntry(path.clone()))?;
            let node = self.node(&path)?;
            self.entry_count += 1;
            files.insert(name, node);
        }
        Ok(files)
    }

    fn node(&mut self, path: &Path) -> Result<Node> {
        let relative = path
            .strip_prefix(self.root)
            .map_err(|_| Error::UnsupportedEntry(path.to_path_buf()))?
            .to_path_buf();
        let metadata = fs::symlink_metadata(path).map_err(|source| Error::PackFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let file_type = metadata.file_type();

        if file_type.is_symlink() {
            let target = fs::read_link(path).map_err(|source| Error::PackFailed {
                path: path.to_path_buf(),
                source,
            })?;
            let resolved = sanitize::root_relative_target(self.root, &relative, &target)?;
            return Ok(Node::Link { link: to_header_path(&resolved)? });
        }
        if file_type.is_dir() {
            return Ok(Node::Directory { files: self.directory(path)? });
        }
        if !file_type.is_file() {
            return Err(Error::UnsupportedEntry(path.to_path_buf()));
        }

        let input = File::open(path).map_err(|source| Error::PackFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let (integrity, size) = integrity::compute(io::BufReader::new(input)).map_err(|source| {
            Error::PackFailed {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let unpacked = self.options.is_unpacked(&relative);
        let offset = if unpacked {
            let destination = self.unpacked_dir.join(&relative);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            pulsesync_fs::copy_file(path, &destination)?;
            self.unpacked_count += 1;
            None
        } else {
            let offset = self.offset;
            self.offset += size;
            self.packed.push(Packed {
                source: path.to_path_buf(),
                size,
            });
            Some(offset.to_string())
        };

        Ok(Node::File(FileNode {
            size,
            offset,
            unpacked,
            executable: is_executable(&metadata),
            integrity: Some(integrity),
        }))
    }
}

/// Header paths always use `/`, whatever the host separator.
fn to_header_path(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| Error::UnsupportedEntry(path.to_path_buf()))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}
