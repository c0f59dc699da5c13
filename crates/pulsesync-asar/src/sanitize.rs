use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Reject header names that would leave the directory they are listed in.
pub fn check_entry_name(name: &str, parent: &Path) -> Result<()> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || Path::new(name).is_absolute();

    if unsafe_name {
        return Err(Error::UnsafeEntryName {
            name: name.to_string(),
            parent: parent.to_path_buf(),
        });
    }
    Ok(())
}

/// Resolve a root-relative link target from the header into the relative
/// path a symlink at `link` (also root-relative) should contain.
pub fn link_target(link: &Path, target: &str) -> Result<PathBuf> {
    let escape = || Error::LinkEscape {
        link: link.to_path_buf(),
        target: PathBuf::from(target),
    };

    let target = Path::new(target);
    if target.is_absolute() {
        return Err(escape());
    }
    let normalized = normalize(target).ok_or_else(escape)?;
    if normalized.as_os_str().is_empty() {
        return Err(escape());
    }

    let depth = link
        .parent()
        .map(|p| p.components().count())
        .unwrap_or(0);
    let mut relative = PathBuf::new();
    for _ in 0..depth {
        relative.push("..");
    }
    relative.push(normalized);
    Ok(relative)
}

/// Root-relative form of a symlink found at `link_rel` while packing.
pub fn root_relative_target(root: &Path, link_rel: &Path, target: &Path) -> Result<PathBuf> {
    let escape = || Error::LinkEscape {
        link: link_rel.to_path_buf(),
        target: target.to_path_buf(),
    };

    let joined = if target.is_absolute() {
        target.strip_prefix(root).map_err(|_| escape())?.to_path_buf()
    } else {
        link_rel.parent().unwrap_or(Path::new("")).join(target)
    };
    normalize(&joined).ok_or_else(escape)
}

/// Collapse `.` and `..` without touching the filesystem. `None` if the path
/// climbs above its starting point.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !result.pop() {
                    return None;
                }
            }
            Component::Normal(part) => result.push(part),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["main.js", ".hidden", "a b", "..dots"] {
            check_entry_name(name, Path::new("lib")).unwrap();
        }
    }

    #[test]
    fn rejects_traversal_names() {
        for name in ["", ".", "..", "a/b", "a\\b", "/etc"] {
            let result = check_entry_name(name, Path::new(""));
            assert!(matches!(result, Err(Error::UnsafeEntryName { .. })), "{name:?}");
        }
    }

    #[test]
    fn link_target_is_relative_to_link_directory() {
        let resolved = link_target(Path::new("a/b/alias.js"), "lib/main.js").unwrap();
        assert_eq!(resolved, Path::new("../../lib/main.js"));

        let resolved = link_target(Path::new("alias.js"), "./lib/main.js").unwrap();
        assert_eq!(resolved, Path::new("lib/main.js"));
    }

    #[test]
    fn link_target_cannot_escape() {
        let result = link_target(Path::new("alias"), "../../etc/passwd");
        assert!(matches!(result, Err(Error::LinkEscape { .. })));

        let absolute = if cfg!(windows) { "C:\\etc" } else { "/etc/passwd" };
        let result = link_target(Path::new("alias"), absolute);
        assert!(matches!(result, Err(Error::LinkEscape { .. })));
    }

    #[test]
    fn root_relative_target_from_symlink() {
        let root = Path::new("/work/app");
        let rel =
            root_relative_target(root, Path::new("bin/tool"), Path::new("../lib/tool.js")).unwrap();
        assert_eq!(rel, Path::new("lib/tool.js"));

        let result = root_relative_target(root, Path::new("tool"), Path::new("../../outside"));
        assert!(matches!(result, Err(Error::LinkEscape { .. })));
    }
}
