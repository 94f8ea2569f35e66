//! Content digests for collected files
//!
//! Uses SHA-256 over a fixed-size streaming buffer so large binaries are never
//! read into memory at once.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

/// Read buffer size for streaming digests
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Hash a file's contents, returning the lowercase hex digest
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Like [`sha256_file`] but an unreadable file yields `None`
pub fn sha256_file_opt(path: &Path) -> Option<String> {
    match sha256_file(path) {
        Ok(digest) => Some(digest),
        Err(e) => {
            debug!("Could not hash {}: {}", path.display(), e);
            None
        }
    }
}

/// Hash an in-memory byte slice
pub fn sha256_bytes(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
