use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use meshlink_core::{ClientSignal, PeerId, ServerSignal};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Timeout for a single expected signal (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 2000;

/// Websocket client speaking the relay protocol.
pub struct TestSignalClient {
    pub peer_id: PeerId,
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestSignalClient {
    /// Connects and consumes the welcome message.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let (socket, _) = connect_async(format!("ws://{}/ws", addr))
            .await
            .context("Failed to connect to relay")?;

        let mut client = Self {
            peer_id: PeerId::new(),
            socket,
        };

        match client.recv().await? {
            ServerSignal::Welcome { peer_id, .. } => client.peer_id = peer_id,
            other => anyhow::bail!("Expected welcome, got {:?}", other),
        }

        Ok(client)
    }

    pub async fn send(&mut self, signal: ClientSignal) -> Result<()> {
        let json = serde_json::to_string(&signal)?;
        self.socket
            .send(Message::Text(json))
            .await
            .context("Failed to send signal")?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<ServerSignal> {
        loop {
            let next = tokio::time::timeout(
                Duration::from_millis(SIGNAL_TIMEOUT_MS),
                self.socket.next(),
            )
            .await
            .context("Timeout waiting for signal")?;

            match next {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(_)) => continue,
                Some(Err(e)) => anyhow::bail!("Socket error: {}", e),
                None => anyhow::bail!("Socket closed"),
            }
        }
    }

    /// Asserts that nothing arrives within `ms`.
    pub async fn expect_silence(&mut self, ms: u64) -> bool {
        tokio::time::timeout(Duration::from_millis(ms), self.socket.next())
            .await
            .is_err()
    }

    pub async fn close(mut self) -> Result<()> {
        self.socket.close(None).await?;
        Ok(())
    }
}
