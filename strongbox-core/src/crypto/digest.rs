//! Content hashing for sync digests.

use sha2::{Digest, Sha256};

/// Hex-encoded 128-bit digest of a stored ciphertext.
///
/// Tombstones have no content and hash as the empty buffer, so every
/// tombstone of a record compares equal on both replicas.
pub fn content_hash(content: Option<&[u8]>) -> String {
    let digest = Sha256::digest(content.unwrap_or_default());
    hex::encode(&digest[..16])
}
