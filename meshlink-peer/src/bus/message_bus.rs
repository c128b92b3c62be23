use crate::bus::{AppFrame, ControlAction, Envelope, MessageKind};
use crate::secure::{Sealed, SymmetricKey};
use crate::transport::Transport;
use anyhow::Result;
use bytes::Bytes;
use meshlink_core::PeerId;
use tracing::debug;

/// A decoded, decrypted message from one link.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Control(ControlAction),
    Frame { kind: MessageKind, frame: AppFrame },
}

/// Envelope codec for one link: seals frames under the pair key and opens them again.
#[derive(Debug, Clone, Copy)]
pub struct MessageBus {
    remote: PeerId,
}

impl MessageBus {
    pub fn new(remote: PeerId) -> Self {
        Self { remote }
    }

    pub async fn send_control(
        &self,
        transport: &dyn Transport,
        action: &ControlAction,
    ) -> Result<bool> {
        let envelope = Envelope::new(MessageKind::Control, serde_json::to_value(action)?);
        self.send_envelope(transport, &envelope).await
    }

    /// Seals `frame` under `key`. Returns `false` without sending when the channel is
    /// not open.
    pub async fn send_frame(
        &self,
        transport: &dyn Transport,
        key: &SymmetricKey,
        kind: MessageKind,
        frame: &AppFrame,
    ) -> Result<bool> {
        let envelope = seal_frame(key, kind, frame)?;
        self.send_envelope(transport, &envelope).await
    }

    async fn send_envelope(&self, transport: &dyn Transport, envelope: &Envelope) -> Result<bool> {
        if !transport.is_open().await {
            debug!("Channel to {} not open, dropping {:?}", self.remote, envelope.kind);
            return Ok(false);
        }

        let raw = serde_json::to_vec(envelope)?;
        transport.send(Bytes::from(raw)).await?;
        Ok(true)
    }

    /// Anything malformed, undecryptable, or arriving before `key` exists yields `None`.
    pub fn receive(&self, raw: &[u8], key: Option<&SymmetricKey>) -> Option<Inbound> {
        let envelope: Envelope = match serde_json::from_slice(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("Malformed envelope from {}: {}", self.remote, e);
                return None;
            }
        };

        if envelope.kind == MessageKind::Control {
            return match serde_json::from_value(envelope.payload) {
                Ok(action) => Some(Inbound::Control(action)),
                Err(e) => {
                    debug!("Malformed control message from {}: {}", self.remote, e);
                    None
                }
            };
        }

        let Some(key) = key else {
            debug!(
                "{:?} from {} before the channel is secure, dropped",
                envelope.kind, self.remote
            );
            return None;
        };

        match open_frame(key, &envelope) {
            Ok(frame) => Some(Inbound::Frame {
                kind: envelope.kind,
                frame,
            }),
            Err(e) => {
                debug!("Dropping {:?} from {}: {}", envelope.kind, self.remote, e);
                None
            }
        }
    }
}

pub fn seal_frame(key: &SymmetricKey, kind: MessageKind, frame: &AppFrame) -> Result<Envelope> {
    let plaintext = serde_json::to_vec(frame)?;
    let sealed = key.seal(&plaintext)?;
    Ok(Envelope::new(kind, serde_json::to_value(sealed)?))
}

pub fn open_frame(key: &SymmetricKey, envelope: &Envelope) -> Result<AppFrame> {
    let sealed: Sealed = serde_json::from_value(envelope.payload.clone())?;
    let plaintext = key.open(&sealed)?;
    Ok(serde_json::from_slice(&plaintext)?)
}
