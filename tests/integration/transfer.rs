use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clipwire_core::crypto::hash_hex;
use clipwire_transfer::archive::{Archive, ArchiveError, Archiver, ScratchDir};
use clipwire_transfer::{prepare_file, FileChannel, MemoryChannel, ReceiveOutcome, Receiver, Sender};
use tokio::time::Instant;

use crate::fault::{Fault, FaultyChannel};
use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  End-to-end transfers
// ══════════════════════════════════════════════════════════════════════════════

/// 10 KiB through 4096-character chunks with a well-behaved channel.
/// Base64 turns the 10,240 bytes into 13,656 characters, so four chunks.
#[tokio::test(start_paused = true)]
async fn test_clean_transfer_is_byte_identical() -> Result<()> {
    let dir = TestDir::new("clean");
    let payload = sample_bytes(10 * 1024, 1);
    let settings = settings_with_chunk_size(4096);
    let channel = MemoryChannel::new();

    let mut sender = Sender::new(channel.clone(), settings.clone());
    let mut receiver = Receiver::new(channel.clone(), dir.join("received.bin"), &settings);
    let (report, outcome) = tokio::join!(sender.send(&payload, None), receiver.receive());
    let report = report?;

    assert_eq!(report.total_chunks, 4);
    assert_eq!(report.retransmissions, 0);
    assert_eq!(
        outcome?,
        ReceiveOutcome::Verified {
            path: dir.join("received.bin"),
            file_hash: hash_hex(&payload),
            bytes: payload.len(),
        }
    );
    assert_eq!(std::fs::read(dir.join("received.bin"))?, payload);

    for n in 1..=4 {
        assert_eq!(data_writes(&channel, n), 1, "chunk {n} written once");
        assert_eq!(ack_writes(&channel, n), 1, "chunk {n} acked once");
    }
    assert_eq!(packet_history(&channel).last(), Some(&clipwire_core::Packet::Finish));
    Ok(())
}

/// The receiver's first ack is overwritten before the sender sees it.
/// The sender resends chunk 1 after the ack timeout; the receiver treats
/// it as a duplicate, acks again, and still stores a single copy.
#[tokio::test(start_paused = true)]
async fn test_lost_ack_recovers_by_retransmission() -> Result<()> {
    let dir = TestDir::new("lost-ack");
    let payload = sample_bytes(3000, 2);
    let settings = settings_with_chunk_size(1024);
    let channel = MemoryChannel::new();

    let receiver_side = FaultyChannel::new(channel.clone(), Fault::ClobberFirstAck);
    let mut sender = Sender::new(channel.clone(), settings.clone());
    let mut receiver = Receiver::new(receiver_side, dir.join("out.bin"), &settings);

    let start = Instant::now();
    let (report, outcome) = tokio::join!(sender.send(&payload, None), receiver.receive());
    let report = report?;

    assert!(receiver.channel().tripped());
    assert!(outcome?.is_verified());
    assert_eq!(report.retransmissions, 1);
    assert!(start.elapsed() >= settings.ack_timeout());

    assert_eq!(data_writes(&channel, 1), 2);
    assert_eq!(ack_writes(&channel, 1), 1, "only the second ack survived");
    assert_eq!(receiver.session().received(), report.total_chunks);
    assert_eq!(
        receiver.session().stored_chunk_numbers(),
        (1..=report.total_chunks as u32).collect::<Vec<_>>()
    );
    assert_eq!(std::fs::read(dir.join("out.bin"))?, payload);
    Ok(())
}

/// A data packet arrives with a payload that no longer matches its hash.
/// It is dropped without an ack, and the retransmission heals the transfer.
#[tokio::test(start_paused = true)]
async fn test_tampered_chunk_is_dropped_then_healed() -> Result<()> {
    let dir = TestDir::new("tamper");
    let payload = sample_bytes(2500, 3);
    let settings = settings_with_chunk_size(2048);
    let channel = MemoryChannel::new();

    let sender_side = FaultyChannel::new(channel.clone(), Fault::TamperFirstData);
    let mut sender = Sender::new(sender_side, settings.clone());
    let mut receiver = Receiver::new(channel.clone(), dir.join("healed.bin"), &settings);

    let (report, outcome) = tokio::join!(sender.send(&payload, None), receiver.receive());
    let report = report?;

    assert!(sender.channel().tripped());
    assert_eq!(report.total_chunks, 2);
    assert_eq!(report.retransmissions, 1);
    assert!(outcome?.is_verified());

    // tampered copy plus the clean resend, but only one ack
    assert_eq!(data_writes(&channel, 1), 2);
    assert_eq!(ack_writes(&channel, 1), 1);
    assert_eq!(std::fs::read(dir.join("healed.bin"))?, payload);
    Ok(())
}

/// Empty files still make a one-chunk transfer.
#[tokio::test(start_paused = true)]
async fn test_empty_file_transfers() -> Result<()> {
    let dir = TestDir::new("empty");
    let settings = settings_with_chunk_size(4096);
    let channel = MemoryChannel::new();

    let mut sender = Sender::new(channel.clone(), settings.clone());
    let mut receiver = Receiver::new(channel.clone(), dir.join("empty.txt"), &settings);
    let (report, outcome) = tokio::join!(sender.send(b"", None), receiver.receive());

    assert_eq!(report?.total_chunks, 1);
    assert!(outcome?.is_verified());
    assert_eq!(std::fs::read(dir.join("empty.txt"))?, b"");
    Ok(())
}

struct PrefixArchiver;

impl Archiver for PrefixArchiver {
    fn name(&self) -> &str {
        "prefix"
    }

    fn extension(&self) -> &str {
        ".tar.xz"
    }

    fn compress(&self, file: &Path) -> Result<Archive, ArchiveError> {
        let scratch = ScratchDir::create()?;
        let path = scratch.path().join("packed.tar.xz");
        let mut bytes = b"PACKED\n".to_vec();
        bytes.extend(std::fs::read(file).unwrap());
        std::fs::write(&path, bytes).unwrap();
        Ok(Archive::new(path, ".tar.xz", scratch))
    }
}

/// An archived send carries its extension through to the saved file name.
#[tokio::test(start_paused = true)]
async fn test_archived_transfer_appends_extension() -> Result<()> {
    let dir = TestDir::new("archive");
    let source = dir.join("report.csv");
    std::fs::write(&source, sample_bytes(5000, 4))?;

    let settings = settings_with_chunk_size(1500);
    let plan = prepare_file(&source, Some(&PrefixArchiver), settings.chunk_size)?;
    assert_eq!(plan.archive_type(), Some(".tar.xz"));

    let channel = MemoryChannel::new();
    let mut sender = Sender::new(channel.clone(), settings.clone());
    let mut receiver = Receiver::new(channel.clone(), dir.join("incoming"), &settings);
    let (report, outcome) = tokio::join!(sender.transmit(&plan), receiver.receive());

    assert_eq!(report?.archive_type.as_deref(), Some(".tar.xz"));
    match outcome? {
        ReceiveOutcome::Verified { path, .. } => {
            assert_eq!(path, dir.join("incoming.tar.xz"));
            let received = std::fs::read(&path)?;
            assert!(received.starts_with(b"PACKED\n"));
            assert_eq!(&received[7..], std::fs::read(&source)?.as_slice());
        }
        other => panic!("expected verified outcome, got {other:?}"),
    }
    assert!(!dir.join("incoming").exists());
    Ok(())
}

/// Same protocol over a plain file shared by both sides.
#[tokio::test(start_paused = true)]
async fn test_file_channel_transfer() -> Result<()> {
    let dir = TestDir::new("file-slot");
    let payload = sample_bytes(7000, 5);
    let settings = settings_with_chunk_size(2000);
    let slot = FileChannel::new(dir.join("slot"));

    let mut sender = Sender::new(slot.clone(), settings.clone());
    let mut receiver = Receiver::new(slot, dir.join("out.bin"), &settings);
    let (report, outcome) = tokio::join!(sender.send(&payload, None), receiver.receive());

    assert_eq!(report?.total_chunks, 5);
    assert!(outcome?.is_verified());
    assert_eq!(std::fs::read(dir.join("out.bin"))?, payload);
    Ok(())
}

/// A slow poller on the receiving side still gets every chunk, because
/// the sender never moves on without an ack.
#[tokio::test(start_paused = true)]
async fn test_slow_receiver_gates_sender() -> Result<()> {
    let dir = TestDir::new("slow");
    let payload = sample_bytes(4000, 6);
    let settings = settings_with_chunk_size(1000);
    let mut slow = settings.clone();
    slow.poll_interval_ms = 7_000;

    let channel = MemoryChannel::new();
    let mut sender = Sender::new(channel.clone(), settings.clone());
    let mut receiver = Receiver::new(channel.clone(), dir.join("out.bin"), &slow);

    let start = Instant::now();
    let (report, outcome) = tokio::join!(sender.send(&payload, None), receiver.receive());
    let report = report?;

    assert!(outcome?.is_verified());
    assert_eq!(report.total_chunks, 6);
    assert_eq!(report.retransmissions, 0);
    assert!(start.elapsed() >= Duration::from_secs(7 * 5));
    Ok(())
}
