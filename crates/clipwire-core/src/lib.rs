//! clipwire-core — shared types, wire format, hashing, and configuration.
//! All other clipwire crates depend on this one.

pub mod config;
pub mod crypto;
pub mod encoding;
pub mod packet;

pub use packet::{DataPacket, DecodeError, Packet};
