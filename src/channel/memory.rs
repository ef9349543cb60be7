//! In-process `PlayerChannel` used by tests and benchmarks
//!
//! `memory_pair` returns the server side (`MemoryChannel`) and a scripted
//! client side (`MemoryClient`) joined by unbounded tokio channels.

use super::{ChannelError, PlayerChannel};
use crate::utils::is_prompt;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

/// Server side of an in-memory connection
pub struct MemoryChannel {
    label: String,
    inbound: Mutex<UnboundedReceiver<String>>,
    outbound: StdMutex<Option<UnboundedSender<String>>>,
    closed: AtomicBool,
}

/// Client side of an in-memory connection
pub struct MemoryClient {
    to_server: Option<UnboundedSender<String>>,
    from_server: UnboundedReceiver<String>,
}

/// Create a connected server/client pair
pub fn memory_pair(label: impl Into<String>) -> (MemoryChannel, MemoryClient) {
    let (to_server, inbound) = mpsc::unbounded_channel();
    let (outbound, from_server) = mpsc::unbounded_channel();

    (
        MemoryChannel {
            label: label.into(),
            inbound: Mutex::new(inbound),
            outbound: StdMutex::new(Some(outbound)),
            closed: AtomicBool::new(false),
        },
        MemoryClient {
            to_server: Some(to_server),
            from_server,
        },
    )
}

#[async_trait]
impl PlayerChannel for MemoryChannel {
    async fn send(&self, message: &str) -> Result<(), ChannelError> {
        let outbound = self
            .outbound
            .lock()
            .map_err(|_| ChannelError::Io("outbound lock poisoned".to_string()))?;

        match outbound.as_ref() {
            Some(tx) => tx
                .send(message.to_string())
                .map_err(|_| ChannelError::Closed),
            None => Err(ChannelError::Closed),
        }
    }

    async fn receive(&self) -> Result<String, ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }

        let mut inbound = self.inbound.lock().await;
        inbound.recv().await.ok_or(ChannelError::Closed)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut outbound) = self.outbound.lock() {
            outbound.take();
        }
        self.inbound.lock().await.close();
    }

    fn peer(&self) -> String {
        format!("memory:{}", self.label)
    }
}

impl MemoryClient {
    /// Send one message to the server. Returns false once the server side is gone.
    pub fn send(&self, message: impl Into<String>) -> bool {
        match &self.to_server {
            Some(tx) => tx.send(message.into()).is_ok(),
            None => false,
        }
    }

    /// Next message from the server, or `None` once the server closed the channel
    pub async fn recv(&mut self) -> Option<String> {
        self.from_server.recv().await
    }

    /// Next message from the server within `timeout`
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<String> {
        tokio::time::timeout(timeout, self.from_server.recv())
            .await
            .ok()
            .flatten()
    }

    /// Read messages until a prompt arrives. Returns everything read, prompt last,
    /// or `None` if the server closed the channel first.
    pub async fn until_prompt(&mut self) -> Option<Vec<String>> {
        let mut transcript = Vec::new();
        loop {
            let message = self.from_server.recv().await?;
            let prompt = is_prompt(&message);
            transcript.push(message);
            if prompt {
                return Some(transcript);
            }
        }
    }

    /// Wait for the next prompt and answer it
    pub async fn reply(&mut self, answer: impl Into<String>) -> Option<Vec<String>> {
        let transcript = self.until_prompt().await?;
        if self.send(answer) {
            Some(transcript)
        } else {
            None
        }
    }

    /// Everything already delivered, without waiting
    pub fn drain(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(message) = self.from_server.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Simulate the client dropping its connection
    pub fn disconnect(&mut self) {
        self.to_server.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_flow_both_ways() {
        let (channel, mut client) = memory_pair("alice");

        channel.send("\nEnter your username: ").await.unwrap();
        let transcript = client.reply("alice").await.unwrap();
        assert_eq!(transcript, vec!["\nEnter your username: ".to_string()]);

        assert_eq!(channel.receive().await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_client_disconnect_fails_receive() {
        let (channel, mut client) = memory_pair("bob");
        client.disconnect();

        assert_eq!(channel.receive().await, Err(ChannelError::Closed));
    }

    #[tokio::test]
    async fn test_close_fails_send_and_ends_client_stream() {
        let (channel, mut client) = memory_pair("carol");
        channel.close().await;

        assert_eq!(channel.send("hello").await, Err(ChannelError::Closed));
        assert_eq!(channel.receive().await, Err(ChannelError::Closed));
        assert_eq!(client.recv().await, None);
    }

    #[tokio::test]
    async fn test_cancelled_receive_does_not_lose_input() {
        let (channel, client) = memory_pair("dave");

        let pending = tokio::time::timeout(Duration::from_millis(10), channel.receive()).await;
        assert!(pending.is_err());

        client.send("y");
        assert_eq!(channel.receive().await.unwrap(), "y");
    }
}
