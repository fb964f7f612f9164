//! Chunking: split an encoded payload into numbered data packets.

use std::ops::Range;

use clipwire_core::crypto::hash_hex;
use clipwire_core::encoding::encode_bytes;
use clipwire_core::DataPacket;

/// An encoded payload, split and ready to send.
///
/// Holds the base64 text once; packets are built from it on demand so a
/// large file is not duplicated per chunk.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    encoded: String,
    segments: Vec<Range<usize>>,
    file_hash: String,
    archive_type: Option<String>,
    payload_bytes: usize,
}

impl ChunkPlan {
    /// Hash, encode, and partition `payload`.
    ///
    /// `chunk_size` counts characters of encoded text. An empty payload
    /// still yields one (empty) chunk so every transfer has at least one.
    pub fn new(payload: &[u8], archive_type: Option<&str>, chunk_size: usize) -> Self {
        let encoded = encode_bytes(payload);
        let segments = segment_ranges(&encoded, chunk_size);
        Self {
            file_hash: hash_hex(payload),
            archive_type: archive_type.map(str::to_string),
            payload_bytes: payload.len(),
            encoded,
            segments,
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.segments.len()
    }

    pub fn file_hash(&self) -> &str {
        &self.file_hash
    }

    pub fn archive_type(&self) -> Option<&str> {
        self.archive_type.as_deref()
    }

    /// Size of the payload before encoding.
    pub fn payload_bytes(&self) -> usize {
        self.payload_bytes
    }

    pub fn encoded_len(&self) -> usize {
        self.encoded.len()
    }

    /// Encoded text of the chunk at `index` (0-based).
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(|r| &self.encoded[r.clone()])
    }

    /// Data packet for the chunk at `index` (0-based).
    pub fn packet(&self, index: usize) -> Option<DataPacket> {
        let segment = self.segment(index)?;
        Some(DataPacket::new(
            index as u32 + 1,
            self.segments.len() as u32,
            &self.file_hash,
            self.archive_type.as_deref(),
            segment,
        ))
    }
}

/// Split `text` into consecutive pieces of `chunk_size` characters.
/// The last piece may be shorter. Empty text yields a single empty piece.
#[cfg(test)]
fn split_chunks(text: &str, chunk_size: usize) -> Vec<&str> {
    segment_ranges(text, chunk_size)
        .into_iter()
        .map(|r| &text[r])
        .collect()
}

/// Number of chunks `char_len` characters split into.
fn chunk_count(char_len: usize, chunk_size: usize) -> usize {
    char_len.div_ceil(chunk_size.max(1)).max(1)
}

fn segment_ranges(text: &str, chunk_size: usize) -> Vec<Range<usize>> {
    let chunk_size = chunk_size.max(1);
    let mut ranges = Vec::with_capacity(chunk_count(text.len(), chunk_size));

    // base64 is ASCII, so this is the common path
    if text.is_ascii() {
        let mut start = 0;
        while start < text.len() {
            let end = (start + chunk_size).min(text.len());
            ranges.push(start..end);
            start = end;
        }
    } else {
        let mut start = 0;
        let mut count = 0;
        for (idx, _) in text.char_indices() {
            if count == chunk_size {
                ranges.push(start..idx);
                start = idx;
                count = 0;
            }
            count += 1;
        }
        ranges.push(start..text.len());
    }

    if ranges.is_empty() {
        ranges.push(0..0);
    }
    ranges
}
