//! Depth-first search over a directory tree.
//!
//! Sibling entries are visited in the order the platform lists them, so when
//! several files match, which one wins depends on the filesystem. Callers
//! that care about a specific copy prune the directories holding the others.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

type Predicate<'a> = Box<dyn Fn(&Path) -> bool + 'a>;

pub struct Walk<'a> {
    root: PathBuf,
    prune: Option<Predicate<'a>>,
}

impl<'a> Walk<'a> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prune: None,
        }
    }

    /// Skip any directory for which `prune` returns true, along with its
    /// whole subtree.
    pub fn prune(mut self, prune: impl Fn(&Path) -> bool + 'a) -> Self {
        self.prune = Some(Box::new(prune));
        self
    }

    /// Skip directories whose file name is one of `names`.
    pub fn prune_names<S: AsRef<OsStr>>(self, names: &'a [S]) -> Self {
        self.prune(move |dir| {
            dir.file_name()
                .is_some_and(|name| names.iter().any(|n| n.as_ref() == name))
        })
    }

    /// Pre-order search; the first non-directory entry accepted by `matches`
    /// wins. Absence is `Ok(None)`, not an error.
    pub fn find(&self, matches: impl Fn(&Path) -> bool) -> Result<Option<PathBuf>> {
        self.visit(&self.root, &matches)
    }

    fn visit(&self, dir: &Path, matches: &dyn Fn(&Path) -> bool) -> Result<Option<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|e| Error::Read {
            path: dir.to_path_buf(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| Error::Read {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| Error::Read {
                path: path.clone(),
                source: e,
            })?;

            if file_type.is_dir() {
                if self.prune.as_ref().is_some_and(|prune| prune(&path)) {
                    continue;
                }
                if let Some(found) = self.visit(&path, matches)? {
                    return Ok(Some(found));
                }
            } else if matches(&path) {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }
}

/// Find the first file called `name` under `root`, skipping directories named
/// in `skip`.
pub fn find_file<S: AsRef<OsStr>>(
    root: impl AsRef<Path>,
    name: impl AsRef<OsStr>,
    skip: &[S],
) -> Result<Option<PathBuf>> {
    let name = name.as_ref();
    Walk::new(root.as_ref())
        .prune_names(skip)
        .find(|path| path.file_name() == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const NO_SKIP: &[&str] = &[];

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "").unwrap();
        path
    }

    #[test]
    fn finds_file_at_root() {
        let dir = tempdir().unwrap();
        let expected = touch(dir.path(), "config.js");
        assert_eq!(find_file(dir.path(), "config.js", NO_SKIP).unwrap(), Some(expected));
    }

    #[test]
    fn finds_nested_file() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a/other.js");
        let expected = touch(dir.path(), "a/b/c/rumScript.js");
        assert_eq!(
            find_file(dir.path(), "rumScript.js", NO_SKIP).unwrap(),
            Some(expected)
        );
    }

    #[test]
    fn prunes_skipped_directories() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "node_modules/x/events.js");
        touch(dir.path(), "constants/events.js");
        let expected = touch(dir.path(), "lib/events.js");

        let found = find_file(dir.path(), "events.js", &["node_modules", "constants"]).unwrap();
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn only_under_skipped_directory_is_not_found() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "node_modules/x/events.js");
        let found = find_file(dir.path(), "events.js", &["node_modules"]).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn directory_with_matching_name_is_not_a_match() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("events.js")).unwrap();
        assert_eq!(find_file(dir.path(), "events.js", NO_SKIP).unwrap(), None);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let result = find_file(dir.path().join("absent"), "x", NO_SKIP);
        assert!(matches!(result, Err(Error::Read { .. })));
    }

    #[test]
    fn custom_predicates() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "skip-me/target.txt");
        let expected = touch(dir.path(), "keep/target.txt");

        let found = Walk::new(dir.path())
            .prune(|d| d.ends_with("skip-me"))
            .find(|f| f.extension().is_some_and(|e| e == "txt"))
            .unwrap();
        assert_eq!(found, Some(expected));
    }
}
