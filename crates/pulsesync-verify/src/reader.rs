use std::io::{self, Read};

use crate::{Hasher, Result, VerifyError};

/// Streaming reader that hashes data as it passes through, so content can be
/// written out and checked in a single pass.
pub struct VerifiedReader<R, H> {
    reader: R,
    hasher: H,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self {
        Self { reader, hasher }
    }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
        }
        Ok(n)
    }
}

impl<R: Read, H: Hasher> VerifiedReader<R, H> {
    /// Finalize verification against the expected digest.
    pub fn finish(self, expected: &[u8]) -> Result<()> {
        let actual = self.hasher.finalize();
        if actual == expected {
            Ok(())
        } else {
            Err(VerifyError::HashMismatch {
                expected: expected.to_vec(),
                actual,
            })
        }
    }

    /// Like [`finish`](Self::finish), with the expectation given as hex.
    pub fn finish_hex(self, expected: &str) -> Result<()> {
        let expected =
            hex::decode(expected).map_err(|_| VerifyError::InvalidDigest(expected.to_string()))?;
        self.finish(&expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sha256Hasher;
    use std::io::Cursor;

    #[test]
    fn test_verified_reader_success() {
        let data = b"test data for verification";
        let expected = Sha256Hasher::digest(data);

        let mut verified = VerifiedReader::new(Cursor::new(data), Sha256Hasher::new());
        let mut sink = Vec::new();
        io::copy(&mut verified, &mut sink).unwrap();

        assert_eq!(sink, data);
        verified.finish(&expected).unwrap();
    }

    #[test]
    fn test_verified_reader_hash_mismatch() {
        let mut verified = VerifiedReader::new(Cursor::new(b"test data"), Sha256Hasher::new());
        io::copy(&mut verified, &mut io::sink()).unwrap();

        let result = verified.finish(&[0; 32]);
        match result {
            Err(VerifyError::HashMismatch { expected, actual }) => {
                assert_eq!(expected, vec![0; 32]);
                assert_ne!(actual, vec![0; 32]);
            }
            other => panic!("expected HashMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_finish_hex_rejects_garbage() {
        let verified = VerifiedReader::new(Cursor::new(b""), Sha256Hasher::new());
        assert!(matches!(
            verified.finish_hex("not-hex"),
            Err(VerifyError::InvalidDigest(_))
        ));
    }
}
