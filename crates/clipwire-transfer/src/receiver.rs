//! Receiver state machine: accumulate, acknowledge, reassemble, verify.
//!
//! Chunks may be seen in any order and any number of times. Storage is
//! keyed by chunk number and never overwritten, so a retransmission only
//! costs another ack. The loop ends on a finish packet or once every
//! chunk is stored, whichever comes first.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use clipwire_core::config::TransferSettings;
use clipwire_core::crypto::hash_hex;
use clipwire_core::encoding::{decode_bytes, EncodingError};
use clipwire_core::{DataPacket, Packet};

use crate::channel::{Channel, ChannelError};
use crate::poller::{ChannelPoller, Polled};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Nothing stored yet.
    Listening,
    Accumulating,
    Reassembling,
    Finished,
}

/// What the session did with one data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDisposition {
    /// First intact copy of this chunk.
    Stored,
    /// Intact, but already held.
    Duplicate,
    /// Payload digest mismatch.
    Corrupt,
}

impl ChunkDisposition {
    /// Whether the chunk earns an ack.
    pub fn acknowledges(self) -> bool {
        matches!(self, Self::Stored | Self::Duplicate)
    }
}

/// Chunks received so far and the metadata latched from them.
#[derive(Debug, Default)]
pub struct ReceiveSession {
    stored_chunks: BTreeMap<u32, String>,
    total_chunks: Option<u32>,
    file_hash: Option<String>,
    archive_type: Option<String>,
    metadata_latched: bool,
}

impl ReceiveSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store one data packet.
    pub fn accept(&mut self, packet: &DataPacket) -> ChunkDisposition {
        // file hash and archive type come from the first data packet seen
        if !self.metadata_latched {
            self.file_hash = Some(packet.original_file_hash.clone());
            self.archive_type = packet.archive_type.clone();
            self.metadata_latched = true;
        }

        if !packet.payload_intact() {
            return ChunkDisposition::Corrupt;
        }

        // latched once, a later disagreeing total does not replace it
        if self.total_chunks.is_none() {
            self.total_chunks = Some(packet.total_chunks);
        } else if self.total_chunks != Some(packet.total_chunks) {
            tracing::debug!(
                chunk_num = packet.chunk_num,
                total_chunks = packet.total_chunks,
                latched = ?self.total_chunks,
                "chunk count differs from the latched total"
            );
        }

        match self.stored_chunks.entry(packet.chunk_num) {
            Entry::Vacant(slot) => {
                slot.insert(packet.payload.clone());
                ChunkDisposition::Stored
            }
            Entry::Occupied(_) => ChunkDisposition::Duplicate,
        }
    }

    pub fn total_chunks(&self) -> Option<u32> {
        self.total_chunks
    }

    pub fn file_hash(&self) -> Option<&str> {
        self.file_hash.as_deref()
    }

    pub fn archive_type(&self) -> Option<&str> {
        self.archive_type.as_deref()
    }

    pub fn received(&self) -> usize {
        self.stored_chunks.len()
    }

    pub fn is_complete(&self) -> bool {
        self.total_chunks
            .is_some_and(|total| self.stored_chunks.len() == total as usize)
    }

    /// Stored chunk numbers, ascending.
    pub fn stored_chunk_numbers(&self) -> Vec<u32> {
        self.stored_chunks.keys().copied().collect()
    }

    /// Stored payloads concatenated in chunk order.
    pub fn assemble_text(&self) -> String {
        self.stored_chunks.values().map(String::as_str).collect()
    }
}

/// How a receive run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// File written and its hash matches the sender's.
    Verified {
        path: PathBuf,
        file_hash: String,
        bytes: usize,
    },
    /// File written, but its hash differs from the sender's.
    Mismatched {
        path: PathBuf,
        expected: String,
        actual: String,
        bytes: usize,
    },
    /// Stopped before every chunk arrived. Nothing written.
    Incomplete {
        received: usize,
        expected: Option<u32>,
    },
    /// Shut down from outside. Nothing written.
    Interrupted {
        received: Vec<u32>,
        expected: Option<u32>,
    },
}

impl ReceiveOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("failed to encode ack: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("reassembled payload is not valid base64: {0}")]
    Decode(#[from] EncodingError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Output path with the archive extension appended, unless it is
/// already there.
pub fn destination_path(output: &Path, archive_type: Option<&str>) -> PathBuf {
    match archive_type {
        Some(ext) if !ext.is_empty() && !output.to_string_lossy().ends_with(ext) => {
            let mut name = output.as_os_str().to_os_string();
            name.push(ext);
            PathBuf::from(name)
        }
        _ => output.to_path_buf(),
    }
}

pub struct Receiver<C> {
    poller: ChannelPoller<C>,
    output: PathBuf,
    session: ReceiveSession,
    state: ReceiverState,
}

impl<C: Channel> Receiver<C> {
    pub fn new(channel: C, output: impl Into<PathBuf>, settings: &TransferSettings) -> Self {
        Self {
            poller: ChannelPoller::new(channel, settings.poll_interval()),
            output: output.into(),
            session: ReceiveSession::new(),
            state: ReceiverState::Listening,
        }
    }

    pub fn session(&self) -> &ReceiveSession {
        &self.session
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn channel(&self) -> &C {
        self.poller.channel()
    }

    /// Receive until finish or completion.
    pub async fn receive(&mut self) -> Result<ReceiveOutcome, ReceiveError> {
        self.receive_until(std::future::pending()).await
    }

    /// Receive until finish, completion, or `shutdown` resolves.
    pub async fn receive_until<F>(&mut self, shutdown: F) -> Result<ReceiveOutcome, ReceiveError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let interrupted = tokio::select! {
            result = self.listen() => {
                result?;
                false
            }
            _ = &mut shutdown => true,
        };

        if interrupted {
            self.state = ReceiverState::Finished;
            tracing::warn!(
                received = self.session.received(),
                expected = ?self.session.total_chunks(),
                "receive interrupted"
            );
            return Ok(ReceiveOutcome::Interrupted {
                received: self.session.stored_chunk_numbers(),
                expected: self.session.total_chunks(),
            });
        }

        self.finalize()
    }

    async fn listen(&mut self) -> Result<(), ReceiveError> {
        tracing::info!(output = %self.output.display(), "listening for chunks");

        while !self.session.is_complete() {
            let Polled::Observed(text) = self.poller.poll_until(None, |_| true).await? else {
                continue;
            };

            match Packet::decode(&text) {
                Ok(Packet::Finish) => {
                    tracing::info!(received = self.session.received(), "finish received");
                    return Ok(());
                }
                Ok(Packet::Data(data)) => self.handle_data(&data)?,
                Ok(Packet::Ack { ack_num }) => {
                    tracing::trace!(ack_num, "ignoring ack");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring channel noise");
                }
            }
        }

        tracing::info!(total_chunks = ?self.session.total_chunks(), "all chunks received");
        Ok(())
    }

    fn handle_data(&mut self, data: &DataPacket) -> Result<(), ReceiveError> {
        let chunk_num = data.chunk_num;
        let disposition = self.session.accept(data);

        match disposition {
            ChunkDisposition::Stored => {
                self.state = ReceiverState::Accumulating;
                tracing::info!(
                    chunk_num,
                    total_chunks = data.total_chunks,
                    received = self.session.received(),
                    "chunk stored"
                )
            }
            ChunkDisposition::Duplicate => {
                tracing::debug!(chunk_num, "duplicate chunk, acknowledging again")
            }
            ChunkDisposition::Corrupt => {
                tracing::warn!(chunk_num, "payload hash mismatch, dropping chunk")
            }
        }

        if disposition.acknowledges() {
            self.poller.publish(&Packet::ack(chunk_num).encode()?)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ReceiveOutcome, ReceiveError> {
        let expected = self.session.total_chunks();
        if !self.session.is_complete() {
            self.state = ReceiverState::Finished;
            tracing::warn!(
                received = self.session.received(),
                expected = ?expected,
                "transfer incomplete, nothing written"
            );
            return Ok(ReceiveOutcome::Incomplete {
                received: self.session.received(),
                expected,
            });
        }

        self.state = ReceiverState::Reassembling;
        let bytes = decode_bytes(&self.session.assemble_text())?;
        let path = destination_path(&self.output, self.session.archive_type());
        std::fs::write(&path, &bytes).map_err(|source| ReceiveError::Write {
            path: path.clone(),
            source,
        })?;

        self.state = ReceiverState::Finished;
        let actual = hash_hex(&bytes);
        let expected_hash = self.session.file_hash().unwrap_or_default();
        if actual == expected_hash {
            tracing::info!(path = %path.display(), bytes = bytes.len(), "file verified");
            Ok(ReceiveOutcome::Verified {
                path,
                file_hash: actual,
                bytes: bytes.len(),
            })
        } else {
            tracing::warn!(
                path = %path.display(),
                expected = expected_hash,
                actual = %actual,
                "file hash mismatch"
            );
            Ok(ReceiveOutcome::Mismatched {
                path,
                expected: expected_hash.to_string(),
                actual,
                bytes: bytes.len(),
            })
        }
    }
}
