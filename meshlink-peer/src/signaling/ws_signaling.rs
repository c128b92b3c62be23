use crate::signaling::SignalingSink;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use meshlink_core::{ClientSignal, ServerSignal};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Websocket connection to a relay.
///
/// Outgoing signals are queued to a writer task; incoming ones are parsed by a reader
/// task and handed out through the receiver returned by [`WsSignaling::connect`].
pub struct WsSignaling {
    tx: mpsc::UnboundedSender<ClientSignal>,
}

impl WsSignaling {
    pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<ServerSignal>)> {
        let (socket, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to relay at {url}"))?;
        info!("Connected to relay at {}", url);

        let (mut ws_sender, mut ws_receiver) = socket.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientSignal>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<ServerSignal>();

        tokio::spawn(async move {
            while let Some(signal) = out_rx.recv().await {
                let json = match serde_json::to_string(&signal) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize signal: {}", e);
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        tokio::spawn(async move {
            while let Some(Ok(msg)) = ws_receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ServerSignal>(&text) {
                        Ok(signal) => {
                            if in_tx.send(signal).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Unparseable relay message: {}", e),
                    },
                    Message::Close(_) => break,
                    other => debug!("Ignoring relay frame: {:?}", other),
                }
            }
            info!("Relay connection closed");
        });

        Ok((Self { tx: out_tx }, in_rx))
    }
}

#[async_trait]
impl SignalingSink for WsSignaling {
    async fn send(&self, signal: ClientSignal) -> Result<()> {
        self.tx
            .send(signal)
            .map_err(|_| anyhow!("Relay connection is closed"))
    }
}
