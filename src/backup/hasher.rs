//! Content hashing
//!
//! SHA-256 digests computed while bytes stream past, so an archived or
//! extracted file is never read twice.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{BackupError, BackupResult};

/// Digest of a byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    /// Lower-case hex SHA-256
    pub hash: String,
    /// Number of bytes hashed
    pub bytes: u64,
}

/// Reader adapter that hashes everything read through it
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
    bytes: u64,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes: 0,
        }
    }

    /// Bytes read so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }

    /// Consume the reader and return the digest of what was read
    pub fn finalize(self) -> ContentDigest {
        ContentDigest {
            hash: format!("{:x}", self.hasher.finalize()),
            bytes: self.bytes,
        }
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }
}

/// Stream `reader` into `writer` one chunk at a time, hashing on the way
pub fn copy_hashed<R: Read, W: Write + ?Sized>(
    reader: R,
    writer: &mut W,
    chunk_size: usize,
) -> io::Result<ContentDigest> {
    let mut reader = HashingReader::new(reader);
    let mut buffer = vec![0u8; chunk_size.max(1)];

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..n])?;
    }

    Ok(reader.finalize())
}

/// Hash a file on disk
pub fn hash_file(path: &Path, chunk_size: usize) -> BackupResult<ContentDigest> {
    let file = File::open(path)
        .map_err(|e| BackupError::Io(format!("Failed to open {}: {}", path.display(), e)))?;
    copy_hashed(file, &mut io::sink(), chunk_size)
        .map_err(|e| BackupError::Io(format!("Failed to read {}: {}", path.display(), e)))
}

/// Hash an in-memory byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
