//! TCP implementation of `PlayerChannel`
//!
//! Wire format: a 2-byte big-endian length prefix followed by that many UTF-8
//! bytes, one frame per message. Incoming bytes that are not valid UTF-8, such
//! as the modified encoding some clients use for NUL and supplementary
//! characters, are replaced with U+FFFD instead of failing the read.

use super::{ChannelError, PlayerChannel};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::debug;

/// Largest message a 2-byte length prefix can describe
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

/// Build the frame codec shared by the server and the console client
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(2)
        .max_frame_length(MAX_MESSAGE_SIZE)
        .new_codec()
}

/// Framed TCP connection to one player.
///
/// Read and write halves are locked independently, so a session can send to a
/// player while a vote task is parked in `receive`.
pub struct TcpChannel {
    peer: SocketAddr,
    reader: Mutex<FramedRead<OwnedReadHalf, LengthDelimitedCodec>>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>>,
}

impl TcpChannel {
    /// Wrap an accepted stream
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
        }
        let (read_half, write_half) = stream.into_split();

        Self {
            peer,
            reader: Mutex::new(FramedRead::new(read_half, frame_codec())),
            writer: Mutex::new(FramedWrite::new(write_half, frame_codec())),
        }
    }

}

#[async_trait]
impl PlayerChannel for TcpChannel {
    async fn send(&self, message: &str) -> Result<(), ChannelError> {
        if message.len() > MAX_MESSAGE_SIZE {
            return Err(ChannelError::Frame(format!(
                "message too large: {} bytes (max {})",
                message.len(),
                MAX_MESSAGE_SIZE
            )));
        }

        let mut writer = self.writer.lock().await;
        writer
            .send(Bytes::copy_from_slice(message.as_bytes()))
            .await
            .map_err(|e| ChannelError::Io(e.to_string()))
    }

    async fn receive(&self) -> Result<String, ChannelError> {
        // FramedRead keeps partial frames in its own buffer, so dropping this
        // future mid-read loses nothing.
        let mut reader = self.reader.lock().await;
        match reader.next().await {
            Some(Ok(frame)) => match String::from_utf8(frame.to_vec()) {
                Ok(text) => Ok(text),
                Err(e) => {
                    debug!("Replacing invalid UTF-8 from {}: {}", self.peer, e);
                    Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
                }
            },
            Some(Err(e)) => Err(ChannelError::Io(e.to_string())),
            None => Err(ChannelError::Closed),
        }
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = SinkExt::<Bytes>::close(&mut *writer).await {
            debug!("Error while closing connection to {}: {}", self.peer, e);
        }
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}
