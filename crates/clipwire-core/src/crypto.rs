//! Content hashing for clipwire.
//!
//! One hash function serves two roles:
//!   1. the whole-file hash, carried in every data packet and checked
//!      after reassembly
//!   2. the payload digest, a per-chunk hash over the chunk's text
//!
//! Both are BLAKE3. Digests travel inside JSON, so the public helpers
//! render them as lowercase hex.

/// Hash a byte slice, returning a 32-byte BLAKE3 digest.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash a byte slice and render the digest as 64 lowercase hex characters.
///
/// This is the form used for `original_file_hash` on the wire.
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash(data))
}

/// Digest of a single chunk's text payload (its UTF-8 bytes).
///
/// Distinct from the whole-file hash: it covers one chunk only and lets
/// the receiver reject a corrupted chunk before storing it.
pub fn payload_digest(payload: &str) -> String {
    hash_hex(payload.as_bytes())
}
