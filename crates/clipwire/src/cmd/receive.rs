//! `clipwire receive`

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clipwire_core::config::ClipwireConfig;
use clipwire_transfer::{Channel, ReceiveOutcome, Receiver};

pub async fn run(channel: Box<dyn Channel>, config: &ClipwireConfig, output: &Path) -> Result<ExitCode> {
    super::clear_channel(channel.as_ref(), config.channel.settle_delay()).await?;

    println!("Waiting for chunks. Press Ctrl-C to stop.");

    let mut receiver = Receiver::new(channel, output, &config.transfer);
    let outcome = receiver.receive_until(shutdown_signal()).await?;

    Ok(report(&outcome))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Print the outcome and map it to the process exit status.
fn report(outcome: &ReceiveOutcome) -> ExitCode {
    println!();
    match outcome {
        ReceiveOutcome::Verified { path, file_hash, bytes } => {
            println!("  ┌─ file verified");
            println!("  │  path  : {}", path.display());
            println!("  │  bytes : {}", bytes);
            println!("  └─ hash  : {}", file_hash);
            ExitCode::SUCCESS
        }
        ReceiveOutcome::Mismatched {
            path,
            expected,
            actual,
            bytes,
        } => {
            println!("  ┌─ INTEGRITY MISMATCH");
            println!("  │  path     : {} (left in place)", path.display());
            println!("  │  bytes    : {}", bytes);
            println!("  │  expected : {}", expected);
            println!("  └─ actual   : {}", actual);
            ExitCode::from(2)
        }
        ReceiveOutcome::Incomplete { received, expected } => {
            println!(
                "Transfer incomplete: {} of {} chunks received. Nothing written.",
                received,
                expected.map_or_else(|| "?".to_string(), |n| n.to_string())
            );
            ExitCode::FAILURE
        }
        ReceiveOutcome::Interrupted { received, expected } => {
            println!(
                "Interrupted with {} of {} chunks received {:?}. Nothing written.",
                received.len(),
                expected.map_or_else(|| "?".to_string(), |n| n.to_string()),
                received
            );
            ExitCode::from(130)
        }
    }
}
