//! Streaming content digests.
//!
//! Each supported algorithm is one variant of [`StreamDigest`]; comparison
//! code only ever calls `update` and `finalize`, so adding an algorithm means
//! adding a variant here.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};

use dupefind_core::DigestAlgorithm;

/// Final digest of a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    Crc32(u32),
    Md5([u8; 16]),
    Blake3([u8; 32]),
}

impl Fingerprint {
    /// Get the digest as a hex string.
    pub fn to_hex(&self) -> String {
        match self {
            Self::Crc32(value) => format!("{value:08x}"),
            Self::Md5(bytes) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
            Self::Blake3(bytes) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        }
    }
}

/// Running digest state.
pub enum StreamDigest {
    Crc32(crc32fast::Hasher),
    Md5(Md5),
    Blake3(Box<blake3::Hasher>),
}

impl StreamDigest {
    /// Start a digest for the given algorithm.
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Crc32 => Self::Crc32(crc32fast::Hasher::new()),
            DigestAlgorithm::Md5 => Self::Md5(Md5::new()),
            DigestAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    /// Feed more bytes.
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Crc32(hasher) => hasher.update(bytes),
            Self::Md5(hasher) => hasher.update(bytes),
            Self::Blake3(hasher) => {
                hasher.update(bytes);
            }
        }
    }

    /// Consume the state and produce the fingerprint.
    pub fn finalize(self) -> Fingerprint {
        match self {
            Self::Crc32(hasher) => Fingerprint::Crc32(hasher.finalize()),
            Self::Md5(hasher) => {
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(&hasher.finalize());
                Fingerprint::Md5(bytes)
            }
            Self::Blake3(hasher) => Fingerprint::Blake3(*hasher.finalize().as_bytes()),
        }
    }
}

/// Digest a reader in chunks of `block_size` bytes.
pub fn fingerprint_reader<R: Read>(
    mut reader: R,
    block_size: usize,
    algorithm: DigestAlgorithm,
) -> io::Result<Fingerprint> {
    let mut digest = StreamDigest::new(algorithm);
    let mut buffer = vec![0u8; block_size.max(1)];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => digest.update(&buffer[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    Ok(digest.finalize())
}

/// Digest a file's full contents.
pub fn fingerprint_file(
    path: &Path,
    block_size: usize,
    algorithm: DigestAlgorithm,
) -> io::Result<Fingerprint> {
    let file = File::open(path)?;
    fingerprint_reader(file, block_size, algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        let crc = fingerprint_reader(&b"123456789"[..], 4, DigestAlgorithm::Crc32).unwrap();
        assert_eq!(crc, Fingerprint::Crc32(0xcbf4_3926));
        assert_eq!(crc.to_hex(), "cbf43926");

        let md5 = fingerprint_reader(&b""[..], 1024, DigestAlgorithm::Md5).unwrap();
        assert_eq!(md5.to_hex(), "d41d8cd98f00b204e9800998ecf8427e");

        let b3 = fingerprint_reader(&b""[..], 1024, DigestAlgorithm::Blake3).unwrap();
        assert_eq!(
            b3.to_hex(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_block_size_does_not_change_digest() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        for algorithm in [DigestAlgorithm::Crc32, DigestAlgorithm::Md5, DigestAlgorithm::Blake3] {
            let small = fingerprint_reader(&data[..], 7, algorithm).unwrap();
            let large = fingerprint_reader(&data[..], 65536, algorithm).unwrap();
            assert_eq!(small, large);
        }
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = fingerprint_file(Path::new("/no/such/file"), 1024, DigestAlgorithm::Md5);
        assert!(err.is_err());
    }
}
