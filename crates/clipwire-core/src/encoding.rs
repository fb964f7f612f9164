//! Byte-to-text codec.
//!
//! The channel carries text only, so file bytes cross it as standard
//! padded base64. Decoding must be the exact inverse of encoding.

use base64::prelude::*;

/// Encode arbitrary bytes as base64 text.
pub fn encode_bytes(data: &[u8]) -> String {
    BASE64_STANDARD.encode(data)
}

/// Decode base64 text back into the original bytes.
pub fn decode_bytes(text: &str) -> Result<Vec<u8>, EncodingError> {
    Ok(BASE64_STANDARD.decode(text)?)
}

#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}
