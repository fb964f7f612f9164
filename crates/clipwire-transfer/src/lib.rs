//! clipwire-transfer — the stop-and-wait protocol over a one-slot channel.
//! The sender and receiver state machines, and the capabilities they run on.

pub mod archive;
pub mod channel;
pub mod chunking;
pub mod poller;
pub mod receiver;
pub mod sender;

pub use archive::{Archive, ArchiveError, Archiver, ExternalArchiver};
pub use channel::{Channel, ChannelError, FileChannel, MemoryChannel};
pub use chunking::ChunkPlan;
pub use poller::{ChannelPoller, Polled};
pub use receiver::{ReceiveError, ReceiveOutcome, Receiver, ReceiverState};
pub use sender::{prepare_file, SendError, SendReport, Sender, SenderState};
