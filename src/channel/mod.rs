//! Player channel abstraction
//!
//! A channel is a per-player duplex stream carrying one discrete text message
//! per `send` / `receive`. The session core only talks to `PlayerChannel`;
//! the TCP listener and the test harness supply concrete implementations.

pub mod memory;
pub mod tcp;

pub use memory::{memory_pair, MemoryChannel, MemoryClient};
pub use tcp::{frame_codec, TcpChannel, MAX_MESSAGE_SIZE};

use async_trait::async_trait;

/// Failures raised by a channel implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed by peer")]
    Closed,

    #[error("i/o error: {0}")]
    Io(String),

    #[error("malformed frame: {0}")]
    Frame(String),
}

/// Duplex, message-framed channel to a single player.
///
/// `receive` must be cancellation safe: dropping the returned future before it
/// completes must release the read side without losing buffered input, so a
/// cancelled vote task leaves the channel usable for the next reader.
#[async_trait]
pub trait PlayerChannel: Send + Sync {
    /// Send one message to the player
    async fn send(&self, message: &str) -> Result<(), ChannelError>;

    /// Wait for the next message from the player
    async fn receive(&self) -> Result<String, ChannelError>;

    /// Close the channel; later sends and receives fail with `Closed`
    async fn close(&self);

    /// Human-readable peer description for logs
    fn peer(&self) -> String;
}
