//! Content comparison of same-sized files.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

use dupefind_core::{DigestAlgorithm, ScanConfig};

use crate::digest::{Fingerprint, fingerprint_file};

/// A file could not be read while comparing.
#[derive(Debug, Error)]
#[error("failed to read {path}: {source}")]
pub struct ReadError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl ReadError {
    fn new(path: &Path, source: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Decides whether two files of equal size have equal content.
///
/// Files are streamed in `block_size` chunks through the configured digest;
/// no file is ever loaded whole. With `verify_bytes` set, a digest match is
/// confirmed by comparing the bytes themselves.
#[derive(Debug, Clone, Copy)]
pub struct ContentComparator {
    block_size: usize,
    algorithm: DigestAlgorithm,
    verify_bytes: bool,
}

impl ContentComparator {
    /// Create a comparator without byte verification.
    pub fn new(block_size: usize, algorithm: DigestAlgorithm) -> Self {
        Self {
            block_size: block_size.max(1),
            algorithm,
            verify_bytes: false,
        }
    }

    /// Create a comparator from the comparison settings of a scan config.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.block_size, config.algorithm).with_verify(config.verify_bytes)
    }

    /// Enable or disable byte-for-byte confirmation of digest matches.
    pub fn with_verify(mut self, verify_bytes: bool) -> Self {
        self.verify_bytes = verify_bytes;
        self
    }

    /// Whether digest matches are confirmed byte for byte.
    pub fn verifies_bytes(&self) -> bool {
        self.verify_bytes
    }

    /// Digest one file.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, ReadError> {
        fingerprint_file(path, self.block_size, self.algorithm).map_err(|e| ReadError::new(path, e))
    }

    /// Compare two files. Only meaningful for files already known to share a size.
    pub fn compare(&self, a: &Path, b: &Path) -> Result<bool, ReadError> {
        if self.fingerprint(a)? != self.fingerprint(b)? {
            return Ok(false);
        }
        if self.verify_bytes {
            return self.bytes_equal(a, b);
        }
        Ok(true)
    }

    /// Compare two files byte for byte.
    pub fn bytes_equal(&self, a: &Path, b: &Path) -> Result<bool, ReadError> {
        let mut file_a = File::open(a).map_err(|e| ReadError::new(a, e))?;
        let mut file_b = File::open(b).map_err(|e| ReadError::new(b, e))?;
        let mut buf_a = vec![0u8; self.block_size];
        let mut buf_b = vec![0u8; self.block_size];

        loop {
            let n_a = read_full(&mut file_a, &mut buf_a).map_err(|e| ReadError::new(a, e))?;
            let n_b = read_full(&mut file_b, &mut buf_b).map_err(|e| ReadError::new(b, e))?;
            if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
                return Ok(false);
            }
            if n_a == 0 {
                return Ok(true);
            }
        }
    }
}

/// Fill `buf` as far as the reader allows. Returns fewer bytes only at EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
