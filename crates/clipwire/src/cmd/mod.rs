//! Command handlers.

pub mod init_config;
pub mod receive;
pub mod send;

use std::time::Duration;

use anyhow::{Context, Result};
use clipwire_transfer::Channel;

/// Blank the channel and give the other side a moment to notice, so
/// neither role starts from a stale packet left by an earlier run.
pub async fn clear_channel(channel: &dyn Channel, settle: Duration) -> Result<()> {
    channel.write("").context("failed to clear the channel")?;
    tokio::time::sleep(settle).await;
    Ok(())
}
