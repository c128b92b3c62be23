use crate::error::SessionError;
use crate::link::LinkSnapshot;
use crate::presence::{PresencePatch, PresenceState};
use crate::session::{Identity, SessionCommand};
use meshlink_core::{PeerId, RoomId};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

/// Cloneable application-side handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { tx }
    }

    pub async fn join(&self, room: impl Into<RoomId>) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command(SessionCommand::Join {
            room: room.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Leaves the room. The session stays usable for another `join`.
    pub async fn leave(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::Leave).await
    }

    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.command(SessionCommand::SendChat { text: text.into() })
            .await
    }

    /// Applies `update` to the local document and publishes it to the room.
    pub async fn publish_update(&self, update: Vec<u8>) -> Result<(), SessionError> {
        self.command(SessionCommand::PublishUpdate { update }).await
    }

    /// Sets `key` in the session's document and publishes the change.
    pub async fn set_entry(&self, key: impl Into<String>, value: Value) -> Result<(), SessionError> {
        self.command(SessionCommand::WriteEntry {
            key: key.into(),
            value: Some(value),
        })
        .await
    }

    pub async fn remove_entry(&self, key: impl Into<String>) -> Result<(), SessionError> {
        self.command(SessionCommand::WriteEntry {
            key: key.into(),
            value: None,
        })
        .await
    }

    pub async fn set_presence(&self, patch: PresencePatch) -> Result<(), SessionError> {
        self.command(SessionCommand::SetPresence { patch }).await
    }

    pub async fn links(&self) -> Result<Vec<LinkSnapshot>, SessionError> {
        self.request(|reply| SessionCommand::Links { reply }).await
    }

    pub async fn presence(&self) -> Result<Vec<(PeerId, PresenceState)>, SessionError> {
        self.request(|reply| SessionCommand::Presence { reply })
            .await
    }

    pub async fn document_state(&self) -> Result<Vec<u8>, SessionError> {
        self.request(|reply| SessionCommand::DocumentState { reply })
            .await
    }

    pub async fn identity(&self) -> Result<Identity, SessionError> {
        self.request(|reply| SessionCommand::Identity { reply })
            .await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn command(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.tx.send(command).await.map_err(|_| SessionError::Closed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command(build(reply)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}
