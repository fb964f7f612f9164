//! The channel capability: a single-slot, overwrite-only text register.
//!
//! A write replaces whatever the slot held, read or not. A read returns
//! the current content without consuming it. There is no notification
//! of change; the poller discovers new content by comparison.
//!
//! Implementations here are the ones that need no external tools:
//! an in-process slot for tests and a plain file. Clipboard backends
//! live in the binary, which resolves them once at startup.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// A one-slot text register shared with the peer.
///
/// Both calls are synchronous and must return in bounded time.
/// An empty slot reads as the empty string.
pub trait Channel {
    /// Replace the slot content with `text`.
    fn write(&self, text: &str) -> Result<(), ChannelError>;

    /// Return the current slot content.
    fn read(&self) -> Result<String, ChannelError>;
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn write(&self, text: &str) -> Result<(), ChannelError> {
        (**self).write(text)
    }

    fn read(&self) -> Result<String, ChannelError> {
        (**self).read()
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },

    #[error("channel file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ── In-memory slot ────────────────────────────────────────────────────────────

/// In-process channel. Clones share the same slot.
///
/// Every write is also appended to a history so tests can observe
/// retransmissions and acks that were overwritten before anyone read them.
#[derive(Debug, Clone, Default)]
pub struct MemoryChannel {
    inner: Arc<Mutex<MemorySlot>>,
}

#[derive(Debug, Default)]
struct MemorySlot {
    content: String,
    history: Vec<String>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current slot content.
    pub fn contents(&self) -> String {
        self.slot().content.clone()
    }

    /// Every write so far, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.slot().history.clone()
    }

    fn slot(&self) -> MutexGuard<'_, MemorySlot> {
        // A panicked writer cannot leave the slot half-written.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Channel for MemoryChannel {
    fn write(&self, text: &str) -> Result<(), ChannelError> {
        let mut slot = self.slot();
        slot.content = text.to_string();
        slot.history.push(text.to_string());
        Ok(())
    }

    fn read(&self) -> Result<String, ChannelError> {
        Ok(self.slot().content.clone())
    }
}

// ── File slot ─────────────────────────────────────────────────────────────────

/// A regular file used as the slot.
///
/// Writes go to a sibling temp file and are renamed into place, so a
/// reader never observes a half-written packet. A missing file reads
/// as empty.
#[derive(Debug, Clone)]
pub struct FileChannel {
    path: PathBuf,
}

impl FileChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "slot".to_string());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", std::process::id()))
    }

    fn io_error(&self, source: std::io::Error) -> ChannelError {
        ChannelError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Channel for FileChannel {
    fn write(&self, text: &str) -> Result<(), ChannelError> {
        let staging = self.staging_path();
        std::fs::write(&staging, text).map_err(|e| self.io_error(e))?;
        std::fs::rename(&staging, &self.path).map_err(|e| self.io_error(e))
    }

    fn read(&self) -> Result<String, ChannelError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
