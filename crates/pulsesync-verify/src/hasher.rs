use sha2::Digest;

pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

#[derive(Clone, Default)]
pub struct Sha256Hasher(sha2::Sha256);

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

impl Sha256Hasher {
    pub fn new() -> Self {
        Self(sha2::Sha256::new())
    }

    pub fn digest(data: &[u8]) -> Vec<u8> {
        sha2::Sha256::digest(data).to_vec()
    }

    /// Lowercase hex SHA-256 of `data`.
    pub fn hex_digest(data: &[u8]) -> String {
        hex::encode(Self::digest(data))
    }
}

/// Hash everything `reader` yields.
pub fn digest_reader<H: Hasher, R: std::io::Read>(
    mut hasher: H,
    mut reader: R,
) -> std::io::Result<Vec<u8>> {
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}

/// Lowercase hex SHA-256 of the file at `path`, streamed.
pub fn sha256_file(path: impl AsRef<std::path::Path>) -> std::io::Result<String> {
    let file = std::fs::File::open(path)?;
    digest_reader(Sha256Hasher::new(), std::io::BufReader::new(file)).map(hex::encode)
}
