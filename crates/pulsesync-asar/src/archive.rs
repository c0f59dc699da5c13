use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use pulsesync_verify::Sha256Hasher;

use crate::entry::{Entry, EntryKind};
use crate::error::{Error, Result};
use crate::header::{self, FileNode, Header, Node, RawHeader};
use crate::sanitize::check_entry_name;

/// Directory holding the files an archive marks as unpacked.
pub fn unpacked_dir_for(archive: &Path) -> PathBuf {
    let mut name = OsString::from(archive.as_os_str());
    name.push(".unpacked");
    PathBuf::from(name)
}

/// An opened archive. Only the header is held in memory; file content is
/// read on demand.
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    len: u64,
    raw: RawHeader,
    header: Header,
}

impl Archive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| Error::ExtractionFailed {
            path: path.clone(),
            source,
        })?;
        let len = file.metadata()?.len();
        let raw = header::read_raw(io::BufReader::new(file), len)?;
        let header = raw.parse()?;

        tracing::debug!(archive = %path.display(), header_bytes = raw.size, "opened archive");
        Ok(Self { path, len, raw, header })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn raw_header(&self) -> &RawHeader {
        &self.raw
    }

    /// SHA-256 over the header JSON exactly as stored.
    pub fn header_hash(&self) -> String {
        Sha256Hasher::hex_digest(self.raw.json.as_bytes())
    }

    pub fn unpacked_dir(&self) -> PathBuf {
        unpacked_dir_for(&self.path)
    }

    /// All entries in depth-first pre-order, parents before children.
    pub fn entries(&self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        collect(&self.header.files, Path::new(""), &mut entries)?;
        Ok(entries)
    }

    /// First file, in pre-order, whose name is `name`.
    pub fn find(&self, name: &str) -> Result<Option<Entry>> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|e| e.is_file() && e.path.file_name().is_some_and(|n| n == name)))
    }

    pub fn node(&self, path: impl AsRef<Path>) -> Result<&Node> {
        let path = path.as_ref();
        let not_found = || Error::EntryNotFound(path.to_path_buf());
        let mut current: Option<&Node> = None;

        for component in path.components() {
            let Component::Normal(part) = component else {
                return Err(not_found());
            };
            let part = part.to_str().ok_or_else(not_found)?;
            let files = match current {
                None => &self.header.files,
                Some(Node::Directory { files }) => files,
                Some(_) => return Err(not_found()),
            };
            current = Some(files.get(part).ok_or_else(not_found)?);
        }
        current.ok_or_else(not_found)
    }

    pub fn file_node(&self, path: impl AsRef<Path>) -> Result<&FileNode> {
        let path = path.as_ref();
        match self.node(path)? {
            Node::File(file) => Ok(file),
            _ => Err(Error::EntryNotFound(path.to_path_buf())),
        }
    }

    /// Stream the content of one file, whether packed or unpacked.
    pub fn open_entry(&self, path: impl AsRef<Path>) -> Result<Box<dyn Read + Send>> {
        let path = path.as_ref();
        let node = self.file_node(path)?;

        if node.unpacked {
            let expected = self.unpacked_dir().join(path);
            let file = File::open(&expected).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::MissingUnpacked {
                    path: path.to_path_buf(),
                    expected: expected.clone(),
                },
                _ => Error::ExtractionFailed {
                    path: expected.clone(),
                    source: e,
                },
            })?;
            return Ok(Box::new(file));
        }

        let offset = node
            .offset()?
            .ok_or_else(|| Error::Corrupted(format!("'{}' has no offset", path.display())))?;
        let start = self
            .raw
            .data_offset()
            .checked_add(offset)
            .filter(|start| start.checked_add(node.size).is_some_and(|end| end <= self.len))
            .ok_or_else(|| {
                Error::Corrupted(format!(
                    "'{}' extends past the end of the archive",
                    path.display()
                ))
            })?;

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start))?;
        Ok(Box::new(file.take(node.size)))
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let size = self.file_node(path)?.size;
        let mut content = Vec::with_capacity(size as usize);
        self.open_entry(path)?.read_to_end(&mut content)?;
        if content.len() as u64 != size {
            return Err(Error::Corrupted(format!(
                "'{}' is {} bytes, header says {size}",
                path.display(),
                content.len()
            )));
        }
        Ok(content)
    }
}

fn collect(
    files: &std::collections::BTreeMap<String, Node>,
    parent: &Path,
    out: &mut Vec<Entry>,
) -> Result<()> {
    for (name, node) in files {
        check_entry_name(name, parent)?;
        let path = parent.join(name);
        match node {
            Node::Directory { files } => {
                out.push(Entry {
                    path: path.clone(),
                    kind: EntryKind::Directory,
                    size: 0,
                    executable: false,
                    unpacked: false,
                });
                collect(files, &path, out)?;
            }
            Node::Link { link } => out.push(Entry {
                path,
                kind: EntryKind::Link { target: link.clone() },
                size: 0,
                executable: false,
                unpacked: false,
            }),
            Node::File(file) => out.push(Entry {
                path,
                kind: EntryKind::File,
                size: file.size,
                executable: file.executable,
                unpacked: file.unpacked,
            }),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_archive(dir: &Path, json: &str, data: &[u8]) -> PathBuf {
        let path = dir.join("app.asar");
        let mut bytes = header::encode(json);
        bytes.extend_from_slice(data);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn reads_packed_files() {
        let dir = tempdir().unwrap();
        let path = write_archive(
            dir.path(),
            r#"{"files":{"a.txt":{"size":5,"offset":"0"},"lib":{"files":{"b.js":{"size":3,"offset":"5"}}}}}"#,
            b"hellofoo",
        );

        let archive = Archive::open(&path).unwrap();
        assert_eq!(archive.read("a.txt").unwrap(), b"hello");
        assert_eq!(archive.read("lib/b.js").unwrap(), b"foo");
        assert!(matches!(archive.read("lib"), Err(Error::EntryNotFound(_))));
        assert!(matches!(archive.read("lib/missing.js"), Err(Error::EntryNotFound(_))));
    }

    #[test]
    fn entries_are_pre_order() {
        let dir = tempdir().unwrap();
        let path = write_archive(
            dir.path(),
            r#"{"files":{"lib":{"files":{"b.js":{"size":0,"offset":"0"}}},"z.js":{"size":0,"offset":"0"}}}"#,
            b"",
        );
        let archive = Archive::open(&path).unwrap();
        let paths: Vec<_> = archive.entries().unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("lib"), PathBuf::from("lib/b.js"), PathBuf::from("z.js")]
        );

        let found = archive.find("b.js").unwrap().unwrap();
        assert_eq!(found.path, PathBuf::from("lib/b.js"));
        assert!(archive.find("lib").unwrap().is_none());
    }

    #[test]
    fn out_of_bounds_offset_is_corrupted() {
        let dir = tempdir().unwrap();
        let path = write_archive(
            dir.path(),
            r#"{"files":{"a.txt":{"size":50,"offset":"0"}}}"#,
            b"short",
        );
        let archive = Archive::open(&path).unwrap();
        assert!(matches!(archive.read("a.txt"), Err(Error::Corrupted(_))));
    }

    #[test]
    fn unsafe_names_are_rejected() {
        let dir = tempdir().unwrap();
        let path = write_archive(dir.path(), r#"{"files":{"..":{"size":0,"offset":"0"}}}"#, b"");
        let archive = Archive::open(&path).unwrap();
        assert!(matches!(archive.entries(), Err(Error::UnsafeEntryName { .. })));
    }

    #[test]
    fn unpacked_file_read_from_sibling_dir() {
        let dir = tempdir().unwrap();
        let path = write_archive(
            dir.path(),
            r#"{"files":{"addon.node":{"size":4,"unpacked":true}}}"#,
            b"",
        );
        let archive = Archive::open(&path).unwrap();
        assert!(matches!(archive.read("addon.node"), Err(Error::MissingUnpacked { .. })));

        std::fs::create_dir_all(archive.unpacked_dir()).unwrap();
        std::fs::write(archive.unpacked_dir().join("addon.node"), b"ELF!").unwrap();
        assert_eq!(archive.read("addon.node").unwrap(), b"ELF!");
    }

    #[test]
    fn header_hash_covers_json() {
        let dir = tempdir().unwrap();
        let json = r#"{"files":{}}"#;
        let path = write_archive(dir.path(), json, b"");
        let archive = Archive::open(&path).unwrap();
        assert_eq!(archive.header_hash(), Sha256Hasher::hex_digest(json.as_bytes()));
    }
}
