use std::io::{self, Read};

use pulsesync_verify::{Hasher, Sha256Hasher};

use crate::header::Integrity;

pub const ALGORITHM: &str = "SHA256";
pub const BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// Hash a file's content the way Electron checks it: one digest over the
/// whole stream plus one per 4 MiB block. The trailing partial block is
/// always hashed, even when empty.
pub fn compute<R: Read>(mut reader: R) -> io::Result<(Integrity, u64)> {
    let mut whole = Sha256Hasher::new();
    let mut blocks = Vec::new();
    let mut buffer = vec![0u8; BLOCK_SIZE as usize];
    let mut total = 0u64;

    loop {
        let n = read_block(&mut reader, &mut buffer)?;
        whole.update(&buffer[..n]);
        blocks.push(Sha256Hasher::hex_digest(&buffer[..n]));
        total += n as u64;
        if (n as u64) < BLOCK_SIZE {
            break;
        }
    }

    let integrity = Integrity {
        algorithm: ALGORITHM.to_string(),
        hash: hex::encode(whole.finalize()),
        block_size: BLOCK_SIZE,
        blocks,
    };
    Ok((integrity, total))
}

fn read_block<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn small_file_has_one_block() {
        let (integrity, size) = compute(Cursor::new(b"hello world")).unwrap();
        assert_eq!(size, 11);
        assert_eq!(integrity.algorithm, "SHA256");
        assert_eq!(
            integrity.hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(integrity.blocks, vec![integrity.hash.clone()]);
    }

    #[test]
    fn empty_file_hashes_empty_block() {
        let (integrity, size) = compute(Cursor::new(b"")).unwrap();
        assert_eq!(size, 0);
        assert_eq!(integrity.blocks.len(), 1);
        assert_eq!(integrity.blocks[0], Sha256Hasher::hex_digest(b""));
    }

    #[test]
    fn exact_block_multiple_gets_trailing_empty_block() {
        let data = vec![7u8; BLOCK_SIZE as usize];
        let (integrity, size) = compute(Cursor::new(&data)).unwrap();
        assert_eq!(size, BLOCK_SIZE);
        assert_eq!(integrity.blocks.len(), 2);
        assert_eq!(integrity.blocks[1], Sha256Hasher::hex_digest(b""));
    }
}
