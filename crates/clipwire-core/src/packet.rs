//! clipwire wire format: the packets exchanged over the channel.
//!
//! These types ARE the protocol. Every packet is a single JSON object
//! with a `type` discriminator, written whole into the channel slot:
//!
//!   {"type":"data","chunk_num":1,"total_chunks":3,...}
//!   {"type":"ack","ack_num":1}
//!   {"type":"finish"}
//!
//! Anything that does not decode into one of these is channel noise.
//! The receiver of noise ignores it; it is never an error for the session.

use serde::{Deserialize, Serialize};

use crate::crypto::payload_digest;

// ── Protocol constants ───────────────────────────────────────────────────────

/// Default chunk size, in characters of encoded (base64) text.
pub const CHUNK_SIZE: usize = 120 * 1024;

/// Default time the sender waits for an ack before re-writing a chunk.
pub const ACK_TIMEOUT_SECS: u64 = 15;

/// Default interval between two reads of the channel.
pub const POLL_INTERVAL_MS: u64 = 1000;

// ── Packets ──────────────────────────────────────────────────────────────────

/// One message on the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Packet {
    /// One chunk of the encoded file.
    Data(DataPacket),

    /// Receiver confirms it holds chunk `ack_num`.
    Ack { ack_num: u32 },

    /// Sender has had every chunk acknowledged and is leaving.
    Finish,
}

/// A chunk of the encoded file plus the transfer metadata.
///
/// The file hash and archive type ride along in every data packet so the
/// receiver can latch them from whichever chunk it happens to see first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPacket {
    /// 1-based position of this chunk. Never exceeds `total_chunks`.
    pub chunk_num: u32,

    /// Number of chunks in the transfer. At least 1.
    pub total_chunks: u32,

    /// Hex BLAKE3 hash of the (possibly archived) file bytes.
    pub original_file_hash: String,

    /// Archive extension such as ".tar.xz", or null for a raw file.
    #[serde(default)]
    pub archive_type: Option<String>,

    /// Hex BLAKE3 digest of `payload` alone.
    /// Checked by the receiver before the chunk is stored or acknowledged.
    pub payload_hash: String,

    /// This chunk's slice of the base64 text.
    pub payload: String,
}

impl DataPacket {
    /// Build a data packet, computing the payload digest.
    pub fn new(
        chunk_num: u32,
        total_chunks: u32,
        original_file_hash: &str,
        archive_type: Option<&str>,
        payload: &str,
    ) -> Self {
        Self {
            chunk_num,
            total_chunks,
            original_file_hash: original_file_hash.to_string(),
            archive_type: archive_type.map(str::to_string),
            payload_hash: payload_digest(payload),
            payload: payload.to_string(),
        }
    }

    /// Recompute the payload digest and compare it with `payload_hash`.
    pub fn payload_intact(&self) -> bool {
        payload_digest(&self.payload) == self.payload_hash
    }
}

impl Packet {
    pub fn ack(ack_num: u32) -> Self {
        Packet::Ack { ack_num }
    }

    /// Serialize to the JSON text written into the channel.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse channel text into a packet.
    ///
    /// Fails on malformed JSON, an unknown `type`, missing fields, and on
    /// sequence numbers that break the 1-based numbering invariants.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let packet: Packet = serde_json::from_str(text)?;
        packet.validate()?;
        Ok(packet)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        match self {
            Packet::Data(data) => {
                if data.chunk_num == 0 {
                    return Err(DecodeError::ZeroField { field: "chunk_num" });
                }
                if data.total_chunks == 0 {
                    return Err(DecodeError::ZeroField { field: "total_chunks" });
                }
                if data.chunk_num > data.total_chunks {
                    return Err(DecodeError::ChunkOutOfRange {
                        chunk_num: data.chunk_num,
                        total_chunks: data.total_chunks,
                    });
                }
                Ok(())
            }
            Packet::Ack { ack_num: 0 } => Err(DecodeError::ZeroField { field: "ack_num" }),
            Packet::Ack { .. } | Packet::Finish => Ok(()),
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Channel content that is not a valid packet.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed packet: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{field} must be at least 1")]
    ZeroField { field: &'static str },

    #[error("chunk_num {chunk_num} exceeds total_chunks {total_chunks}")]
    ChunkOutOfRange { chunk_num: u32, total_chunks: u32 },
}

// ── Tests ────────────────────────────────────────────────────────────────────
