//! Fault-injecting channel wrappers.
//!
//! Each wrapper sits in front of one side's view of the shared slot and
//! corrupts a single write, then behaves normally.

use std::sync::atomic::{AtomicBool, Ordering};

use clipwire_core::Packet;
use clipwire_transfer::{Channel, ChannelError, MemoryChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The first ack written is replaced by unrelated clipboard text,
    /// as if the user copied something at the wrong moment.
    ClobberFirstAck,
    /// The first data packet written has its payload altered in transit
    /// while its payload hash is left as it was.
    TamperFirstData,
}

pub struct FaultyChannel {
    inner: MemoryChannel,
    fault: Fault,
    tripped: AtomicBool,
}

impl FaultyChannel {
    pub fn new(inner: MemoryChannel, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            tripped: AtomicBool::new(false),
        }
    }

    pub fn tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    fn corrupt(&self, text: &str) -> Option<String> {
        if self.tripped() {
            return None;
        }
        let replacement = match (self.fault, Packet::decode(text).ok()?) {
            (Fault::ClobberFirstAck, Packet::Ack { .. }) => {
                "meeting notes: call back at 3pm".to_string()
            }
            (Fault::TamperFirstData, Packet::Data(_)) => tamper_payload(text)?,
            _ => return None,
        };
        self.tripped.store(true, Ordering::SeqCst);
        Some(replacement)
    }
}

impl Channel for FaultyChannel {
    fn write(&self, text: &str) -> Result<(), ChannelError> {
        match self.corrupt(text) {
            Some(corrupted) => self.inner.write(&corrupted),
            None => self.inner.write(text),
        }
    }

    fn read(&self) -> Result<String, ChannelError> {
        self.inner.read()
    }
}

/// Flip the first payload character, keeping the rest of the JSON intact.
fn tamper_payload(text: &str) -> Option<String> {
    let mut value: serde_json::Value = serde_json::from_str(text).ok()?;
    let payload = value.get("payload")?.as_str()?;
    let mut chars: Vec<char> = payload.chars().collect();
    let first = chars.first_mut()?;
    *first = if *first == 'A' { 'B' } else { 'A' };
    value["payload"] = serde_json::Value::String(chars.into_iter().collect());
    serde_json::to_string(&value).ok()
}
