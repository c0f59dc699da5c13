//! Content verification primitives.
//!
//! Provides incremental hashing so archive entries can be checked while they
//! are being copied, without a second read.
//!
//! # Example
//!
//! ```
//! use std::io::Read;
//! use pulsesync_verify::{Sha256Hasher, VerifiedReader};
//!
//! let data = b"hello world";
//! let expected = Sha256Hasher::digest(data);
//!
//! let mut reader = VerifiedReader::new(&data[..], Sha256Hasher::new());
//! let mut buffer = Vec::new();
//! reader.read_to_end(&mut buffer).unwrap();
//!
//! reader.finish(&expected).unwrap();
//! ```

pub use self::error::{Result, VerifyError};
pub use self::hasher::{Hasher, Sha256Hasher, digest_reader, sha256_file};
pub use self::reader::VerifiedReader;

mod error;
mod hasher;
mod reader;
