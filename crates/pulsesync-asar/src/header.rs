//! The archive header: a JSON directory tree wrapped in two Chromium pickles.
//!
//! ```text
//! [u32 4][u32 header_size]                     size pickle
//! [u32 payload][u32 json_len][json][pad to 4]  header pickle, header_size bytes
//! [file data ...]                              offsets are relative to 8 + header_size
//! ```

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const SIZE_PICKLE_LEN: usize = 8;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub files: BTreeMap<String, Node>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Directory { files: BTreeMap<String, Node> },
    Link { link: String },
    File(FileNode),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub size: u64,

    /// Decimal string; absent for unpacked files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unpacked: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub executable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<Integrity>,
}

impl FileNode {
    pub fn offset(&self) -> Result<Option<u64>> {
        self.offset
            .as_deref()
            .map(|raw| {
                raw.parse::<u64>()
                    .map_err(|_| Error::Corrupted(format!("offset '{raw}' is not a number")))
            })
            .transpose()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrity {
    pub algorithm: String,
    pub hash: String,
    pub block_size: u64,
    pub blocks: Vec<String>,
}

/// Header as it sits in the file, before JSON parsing.
#[derive(Clone, Debug)]
pub struct RawHeader {
    /// Length of the header pickle in bytes.
    pub size: u32,
    pub json: String,
}

impl RawHeader {
    /// Absolute file offset at which packed file data starts.
    pub fn data_offset(&self) -> u64 {
        SIZE_PICKLE_LEN as u64 + u64::from(self.size)
    }

    pub fn parse(&self) -> Result<Header> {
        serde_json::from_str(&self.json).map_err(Error::InvalidHeader)
    }
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Read both pickles from the start of an archive of `total_len` bytes.
pub fn read_raw<R: Read>(mut reader: R, total_len: u64) -> Result<RawHeader> {
    let mut size_pickle = [0u8; SIZE_PICKLE_LEN];
    reader
        .read_exact(&mut size_pickle)
        .map_err(|_| Error::Corrupted("file is shorter than the size pickle".into()))?;

    if u32_at(&size_pickle, 0) != 4 {
        return Err(Error::Corrupted("size pickle has unexpected payload length".into()));
    }
    let size = u32_at(&size_pickle, 4);
    if (size as usize) < 8 || u64::from(size) > total_len.saturating_sub(SIZE_PICKLE_LEN as u64) {
        return Err(Error::Corrupted(format!("header size {size} out of range")));
    }

    let mut pickle = vec![0u8; size as usize];
    reader
        .read_exact(&mut pickle)
        .map_err(|_| Error::Corrupted("header pickle is truncated".into()))?;

    let payload = u32_at(&pickle, 0) as usize;
    let json_len = u32_at(&pickle, 4) as usize;
    if payload + 4 > pickle.len() || json_len + 4 > payload {
        return Err(Error::Corrupted("header string length out of range".into()));
    }

    let json = String::from_utf8(pickle[8..8 + json_len].to_vec())
        .map_err(|_| Error::Corrupted("header is not valid UTF-8".into()))?;

    Ok(RawHeader { size, json })
}

/// Frame a JSON header string the way `read_raw` expects it.
pub fn encode(json: &str) -> Vec<u8> {
    let json = json.as_bytes();
    let padding = (4 - json.len() % 4) % 4;
    let payload = 4 + json.len() + padding;
    let size = 4 + payload;

    let mut out = Vec::with_capacity(SIZE_PICKLE_LEN + size);
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&(size as u32).to_le_bytes());
    out.extend_from_slice(&(payload as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(json);
    out.resize(out.len() + padding, 0);
    out
}
