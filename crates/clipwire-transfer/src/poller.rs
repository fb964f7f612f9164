//! Channel poller: turns a poll-only register into a stream of changes.
//!
//! The channel never says when it changed. The poller reads it every
//! `interval`, compares against the last content it saw, and hands only
//! genuinely new content to the caller. Both roles use it: the sender
//! with a finite timeout while it waits for an ack, the receiver with no
//! timeout for its main loop.
//!
//! The sleep between ticks is the only suspension point in the protocol.

use std::time::Duration;

use tokio::time::Instant;

use crate::channel::{Channel, ChannelError};

/// Result of one `poll_until` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled {
    /// New content that satisfied the predicate.
    Observed(String),
    /// The timeout elapsed first.
    TimedOut,
}

/// Reads a channel at a fixed interval, suppressing repeats.
pub struct ChannelPoller<C> {
    channel: C,
    interval: Duration,
    /// Dedup cursor. Never reset while the process runs.
    last_seen: String,
}

impl<C: Channel> ChannelPoller<C> {
    pub fn new(channel: C, interval: Duration) -> Self {
        Self {
            channel,
            interval,
            last_seen: String::new(),
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// The most recent content this poller observed or wrote.
    pub fn last_seen(&self) -> &str {
        &self.last_seen
    }

    /// Write `text` to the channel and record it as seen, so this side
    /// never hands its own write back to itself.
    pub fn publish(&mut self, text: &str) -> Result<(), ChannelError> {
        self.channel.write(text)?;
        self.last_seen.clear();
        self.last_seen.push_str(text);
        Ok(())
    }

    /// Poll until `accept` returns true for a new channel value, or until
    /// `timeout` elapses. `None` polls forever.
    ///
    /// `accept` sees each distinct value once. Empty content and content
    /// equal to the cursor are skipped without calling it.
    pub async fn poll_until<F>(
        &mut self,
        timeout: Option<Duration>,
        mut accept: F,
    ) -> Result<Polled, ChannelError>
    where
        F: FnMut(&str) -> bool,
    {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let content = self.channel.read()?;
            if !content.is_empty() && content != self.last_seen {
                self.last_seen = content;
                if accept(&self.last_seen) {
                    return Ok(Polled::Observed(self.last_seen.clone()));
                }
            } else {
                tracing::trace!("channel unchanged");
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(Polled::TimedOut);
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
