pub mod atomic_write;
pub mod backup;
pub mod replace_dir;

pub use atomic_write::{Options as AtomicWriteOptions, atomic_write, read_to_string, temp_sibling};
pub use backup::{backup_file, backup_path, copy_file};
pub use replace_dir::{Options as ReplaceDirOptions, remove_dir_all, replace_dir};
