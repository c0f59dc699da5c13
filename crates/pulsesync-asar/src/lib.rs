//! Reading, extracting and packing Electron `asar` archives.
//!
//! # Architecture
//!
//! - `header.rs` - Pickle framing and the JSON directory tree
//! - `sanitize.rs` - Entry name and link target checks
//! - `archive.rs` - Random access to entries of an opened archive
//! - `extract.rs` - Staged extraction into a directory
//! - `pack.rs` - Deterministic packing of a directory
//! - `integrity.rs` - Per-file SHA-256 block hashes

pub use archive::{Archive, unpacked_dir_for};
pub use entry::{ArchiveReport, Entry, EntryKind, PackReport};
pub use error::{Error, Result};
pub use extract::{extract, extract_archive};
pub use options::{ExtractOptions, PackOptions, Progress};
pub use pack::pack;

mod archive;
pub mod entry;
mod error;
pub mod extract;
pub mod header;
pub mod integrity;
pub mod options;
mod pack;
mod sanitize;
