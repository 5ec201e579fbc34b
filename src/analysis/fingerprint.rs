//! Content hashing

use sha2::{Digest, Sha256};

/// Lower-case hex SHA-256 of the text's UTF-8 bytes
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
