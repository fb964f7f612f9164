//! `clipwire send`

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use clipwire_core::config::ClipwireConfig;
use clipwire_transfer::{prepare_file, Archiver, Channel, ExternalArchiver, Sender};

pub struct SendOptions<'a> {
    pub file: &'a Path,
    pub archive: bool,
    pub yes: bool,
}

pub async fn run(
    channel: Box<dyn Channel>,
    config: &ClipwireConfig,
    options: SendOptions<'_>,
) -> Result<()> {
    let archiver = if options.archive {
        Some(
            ExternalArchiver::detect(&config.archive.preferred)
                .context("archiving was requested")?,
        )
    } else {
        None
    };

    let plan = prepare_file(
        options.file,
        archiver.as_ref().map(|a| a as &dyn Archiver),
        config.transfer.chunk_size,
    )
    .with_context(|| format!("failed to prepare {}", options.file.display()))?;

    super::clear_channel(channel.as_ref(), config.channel.settle_delay()).await?;

    println!("═══════════════════════════════════════");
    println!("  clipwire send");
    println!("═══════════════════════════════════════");
    println!("  File      : {}", options.file.display());
    println!("  Archive   : {}", plan.archive_type().unwrap_or("none"));
    println!("  Payload   : {} bytes", plan.payload_bytes());
    println!("  Encoded   : {} chars", plan.encoded_len());
    println!("  Chunks    : {}", plan.total_chunks());
    println!("  Hash      : {}", plan.file_hash());

    if !options.yes {
        println!();
        println!("Start the receiver, then press Enter to begin sending.");
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read from stdin")?;
    }

    let mut sender = Sender::new(channel, config.transfer.clone());
    let report = sender.transmit(&plan).await?;

    println!();
    println!("  ┌─ transfer complete");
    println!("  │  chunks          : {}", report.total_chunks);
    println!("  │  retransmissions : {}", report.retransmissions);
    println!("  │  payload         : {} bytes", report.payload_bytes);
    println!("  └─ hash            : {}", report.file_hash);

    Ok(())
}
