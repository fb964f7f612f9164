//! clipwire integration test harness.
//!
//! A sender and a receiver run concurrently in one test, sharing an
//! in-process or file-backed slot. Tokio time is paused, so ack timeouts
//! elapse instantly and every run is deterministic:
//!
//!   cargo test --test integration
//!
//! Faults are injected by wrapping one side's channel (see `fault.rs`).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use clipwire_core::config::TransferSettings;
use clipwire_core::Packet;
use clipwire_transfer::MemoryChannel;

mod fault;
mod transfer;

// ── Harness ───────────────────────────────────────────────────────────────────

static DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Scratch directory removed on drop, even when the test panics.
pub struct TestDir {
    path: PathBuf,
}

impl TestDir {
    pub fn new(tag: &str) -> Self {
        let id = DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir()
            .join(format!("clipwire-it-{tag}-{}-{}", std::process::id(), id));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Deterministic pseudo-random bytes.
pub fn sample_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xff) as u8
        })
        .collect()
}

pub fn settings_with_chunk_size(chunk_size: usize) -> TransferSettings {
    TransferSettings {
        chunk_size,
        ..TransferSettings::default()
    }
}

/// Every decodable packet ever written to the slot, oldest first.
pub fn packet_history(channel: &MemoryChannel) -> Vec<Packet> {
    channel
        .history()
        .iter()
        .filter_map(|text| Packet::decode(text).ok())
        .collect()
}

/// How many times chunk `n` was written.
pub fn data_writes(channel: &MemoryChannel, n: u32) -> usize {
    packet_history(channel)
        .iter()
        .filter(|p| matches!(p, Packet::Data(d) if d.chunk_num == n))
        .count()
}

/// How many times `Ack{n}` was written.
pub fn ack_writes(channel: &MemoryChannel, n: u32) -> usize {
    packet_history(channel)
        .iter()
        .filter(|p| matches!(p, Packet::Ack { ack_num } if *ack_num == n))
        .count()
}
