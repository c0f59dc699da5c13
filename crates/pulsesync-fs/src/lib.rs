//! Filesystem primitives used while patching an application's resources.
//!
//! Everything that mutates a file the target application reads goes through a
//! temporary sibling and a rename, so an interrupted run leaves either the old
//! file or the new one behind.

mod error;
pub mod primitives;
mod stability;
pub mod walk;
mod workspace;

pub use error::{Error, Result};
pub use primitives::{
    AtomicWriteOptions, ReplaceDirOptions, atomic_write, backup_file, backup_path, copy_file,
    read_to_string, remove_dir_all, replace_dir, temp_sibling,
};
pub use stability::{Fingerprint, StabilityOptions, wait_for_stable};
pub use walk::{Walk, find_file};
pub use workspace::StagingDir;
