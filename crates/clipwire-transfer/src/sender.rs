//! Sender state machine: stop-and-wait over the channel.
//!
//! One chunk is in flight at a time. The sender writes a data packet,
//! waits for the matching ack, and re-writes the identical packet if the
//! ack does not arrive within the timeout. After the last ack it writes
//! a single finish packet and stops.
//!
//! ```text
//! Idle → Sending(i) → AwaitingAck(i) ─ack─→ Sending(i+1) … → Finished
//!                          │
//!                       timeout → Sending(i) again
//! ```

use std::path::{Path, PathBuf};

use clipwire_core::config::TransferSettings;
use clipwire_core::Packet;

use crate::archive::{ArchiveError, Archiver};
use crate::channel::{Channel, ChannelError};
use crate::chunking::ChunkPlan;
use crate::poller::{ChannelPoller, Polled};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    Sending { chunk_index: usize },
    AwaitingAck { chunk_index: usize, attempt: u32 },
    Finished,
}

/// Per-transfer bookkeeping, alive for one `transmit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendSession {
    pub total_chunks: usize,
    pub file_hash: String,
    pub archive_type: Option<String>,
    /// 0-based index of the chunk in flight.
    pub current_chunk_index: usize,
}

/// Summary of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub file_hash: String,
    pub total_chunks: usize,
    pub payload_bytes: usize,
    /// Re-writes caused by ack timeouts, across all chunks.
    pub retransmissions: u32,
    pub archive_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("failed to encode packet: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("peer unresponsive: chunk {chunk_num} unacknowledged after {attempts} attempts")]
    PeerUnresponsive { chunk_num: u32, attempts: u32 },

    #[error("payload needs {0} chunks, more than the packet format can number")]
    TooManyChunks(usize),
}

/// Read `path`, optionally compressing it first, and plan its chunks.
///
/// Archiving happens here, before anything touches the channel, so an
/// archiver failure never leaves a half-sent transfer behind.
pub fn prepare_file(
    path: &Path,
    archiver: Option<&dyn Archiver>,
    chunk_size: usize,
) -> Result<ChunkPlan, SendError> {
    let read = |p: &Path| {
        std::fs::read(p).map_err(|source| SendError::ReadFile {
            path: p.to_path_buf(),
            source,
        })
    };

    match archiver {
        Some(archiver) => {
            let archive = archiver.compress(path)?;
            let bytes = read(&archive.path)?;
            tracing::info!(
                archiver = archiver.name(),
                original = %path.display(),
                archived_bytes = bytes.len(),
                "payload archived"
            );
            Ok(ChunkPlan::new(&bytes, Some(&archive.extension), chunk_size))
        }
        None => {
            let bytes = read(path)?;
            Ok(ChunkPlan::new(&bytes, None, chunk_size))
        }
    }
}

pub struct Sender<C> {
    poller: ChannelPoller<C>,
    settings: TransferSettings,
    state: SenderState,
    session: Option<SendSession>,
}

impl<C: Channel> Sender<C> {
    pub fn new(channel: C, settings: TransferSettings) -> Self {
        let poller = ChannelPoller::new(channel, settings.poll_interval());
        Self {
            poller,
            settings,
            state: SenderState::Idle,
            session: None,
        }
    }

    pub fn state(&self) -> &SenderState {
        &self.state
    }

    pub fn session(&self) -> Option<&SendSession> {
        self.session.as_ref()
    }

    pub fn channel(&self) -> &C {
        self.poller.channel()
    }

    /// Chunk `payload` with the configured chunk size and transmit it.
    pub async fn send(
        &mut self,
        payload: &[u8],
        archive_type: Option<&str>,
    ) -> Result<SendReport, SendError> {
        let plan = ChunkPlan::new(payload, archive_type, self.settings.chunk_size);
        self.transmit(&plan).await
    }

    /// Drive every chunk of `plan` through write → ack, then write finish.
    pub async fn transmit(&mut self, plan: &ChunkPlan) -> Result<SendReport, SendError> {
        let total_chunks = plan.total_chunks();
        if u32::try_from(total_chunks).is_err() {
            return Err(SendError::TooManyChunks(total_chunks));
        }

        self.session = Some(SendSession {
            total_chunks,
            file_hash: plan.file_hash().to_string(),
            archive_type: plan.archive_type().map(str::to_string),
            current_chunk_index: 0,
        });
        tracing::info!(
            total_chunks,
            payload_bytes = plan.payload_bytes(),
            file_hash = plan.file_hash(),
            "transfer starting"
        );

        let ack_timeout = self.settings.ack_timeout();
        let retry_limit = self.settings.retry_limit();
        let mut retransmissions = 0u32;

        for chunk_index in 0..total_chunks {
            let Some(packet) = plan.packet(chunk_index) else {
                break;
            };
            let chunk_num = packet.chunk_num;
            let text = Packet::Data(packet).encode()?;
            if let Some(session) = self.session.as_mut() {
                session.current_chunk_index = chunk_index;
            }

            let mut attempt = 1u32;
            loop {
                self.state = SenderState::Sending { chunk_index };
                self.poller.publish(&text)?;
                tracing::debug!(chunk_num, total_chunks, attempt, "chunk written");

                self.state = SenderState::AwaitingAck {
                    chunk_index,
                    attempt,
                };
                let polled = self
                    .poller
                    .poll_until(Some(ack_timeout), |content| is_ack_for(content, chunk_num))
                    .await?;

                match polled {
                    Polled::Observed(_) => {
                        tracing::info!(chunk_num, total_chunks, "chunk acknowledged");
                        break;
                    }
                    Polled::TimedOut => {
                        if retry_limit.is_some_and(|limit| attempt > limit) {
                            tracing::error!(chunk_num, attempts = attempt, "peer unresponsive");
                            return Err(SendError::PeerUnresponsive {
                                chunk_num,
                                attempts: attempt,
                            });
                        }
                        tracing::warn!(
                            chunk_num,
                            attempt,
                            timeout_secs = ack_timeout.as_secs(),
                            "no ack, resending chunk"
                        );
                        attempt += 1;
                        retransmissions += 1;
                    }
                }
            }
        }

        self.poller.publish(&Packet::Finish.encode()?)?;
        self.state = SenderState::Finished;
        tracing::info!(total_chunks, retransmissions, "transfer finished");

        Ok(SendReport {
            file_hash: plan.file_hash().to_string(),
            total_chunks,
            payload_bytes: plan.payload_bytes(),
            retransmissions,
            archive_type: plan.archive_type().map(str::to_string),
        })
    }
}

/// Malformed content and acks for other chunks both mean "not yet".
fn is_ack_for(content: &str, chunk_num: u32) -> bool {
    match Packet::decode(content) {
        Ok(Packet::Ack { ack_num }) => ack_num == chunk_num,
        Ok(_) => false,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring channel noise while awaiting ack");
            false
        }
    }
}
