use crate::error::RelayError;
use crate::room::{LeaveOutcome, RoomRegistry};
use crate::signaling::SignalingOutput;
use meshlink_core::{ClientSignal, PeerId, Role, RoomId, ServerSignal};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Session-oriented message router.
///
/// Tracks membership and forwards negotiation envelopes. Payloads are never inspected.
pub struct Relay {
    registry: Mutex<RoomRegistry>,
    output: Arc<dyn SignalingOutput>,
}

impl Relay {
    pub fn new(output: Arc<dyn SignalingOutput>, promote_host: bool) -> Self {
        Self {
            registry: Mutex::new(RoomRegistry::new(promote_host)),
            output,
        }
    }

    pub async fn handle(&self, from: PeerId, signal: ClientSignal) -> Result<(), RelayError> {
        match signal {
            ClientSignal::JoinRoom { room_id } => {
                self.join(room_id, from).await;
                Ok(())
            }
            ClientSignal::LeaveRoom { room_id } => self.leave(&room_id, from).await,
            ClientSignal::Offer {
                room_id,
                offer,
                target_id,
            } => {
                let signal = ServerSignal::Offer {
                    room_id: room_id.clone(),
                    offer,
                    from_id: from,
                };
                self.forward(from, &room_id, target_id, signal)
                    .await
                    .map(|_| ())
            }
            ClientSignal::Answer {
                room_id,
                answer,
                target_id,
            } => {
                let signal = ServerSignal::Answer {
                    room_id: room_id.clone(),
                    answer,
                    from_id: from,
                };
                self.forward(from, &room_id, target_id, signal)
                    .await
                    .map(|_| ())
            }
            ClientSignal::IceCandidate {
                room_id,
                candidate,
                target_id,
            } => {
                let signal = ServerSignal::IceCandidate {
                    room_id: room_id.clone(),
                    candidate,
                    from_id: from,
                };
                self.forward(from, &room_id, target_id, signal)
                    .await
                    .map(|_| ())
            }
        }
    }

    /// Admits `peer_id`, answers with its role and the present members, and tells the
    /// present members a newcomer arrived.
    pub async fn join(&self, room_id: RoomId, peer_id: PeerId) -> Role {
        let outcome = self.registry().join(room_id, peer_id);

        if let Some(previous) = &outcome.previous {
            self.announce_departure(peer_id, previous).await;
        }

        self.output
            .deliver(peer_id, ServerSignal::Role { role: outcome.role })
            .await;
        self.output
            .deliver(
                peer_id,
                ServerSignal::RoomPeers {
                    peers: outcome.existing.clone(),
                },
            )
            .await;

        if !outcome.already_member {
            for member in &outcome.existing {
                self.output
                    .deliver(*member, ServerSignal::PeerJoined { peer_id })
                    .await;
            }
        }

        outcome.role
    }

    pub async fn leave(&self, room_id: &RoomId, peer_id: PeerId) -> Result<(), RelayError> {
        let outcome = {
            let mut registry = self.registry();
            if !registry.is_member(room_id, &peer_id) {
                return Err(RelayError::NotInRoom {
                    peer_id,
                    room_id: room_id.clone(),
                });
            }
            registry.leave(&peer_id)
        };

        if let Some(outcome) = outcome {
            self.announce_departure(peer_id, &outcome).await;
        }
        Ok(())
    }

    /// Connection closed: drop the member wherever it is.
    pub async fn disconnect(&self, peer_id: PeerId) {
        let outcome = self.registry().leave(&peer_id);

        match outcome {
            Some(outcome) => self.announce_departure(peer_id, &outcome).await,
            None => debug!("Peer {} disconnected outside any room", peer_id),
        }
    }

    /// Forwards an envelope to `target`, or to every other member when untargeted.
    /// Returns how many sessions it was delivered to.
    pub async fn forward(
        &self,
        from: PeerId,
        room_id: &RoomId,
        target: Option<PeerId>,
        signal: ServerSignal,
    ) -> Result<usize, RelayError> {
        let recipients = {
            let registry = self.registry();
            if !registry.is_member(room_id, &from) {
                return Err(RelayError::NotInRoom {
                    peer_id: from,
                    room_id: room_id.clone(),
                });
            }

            match target {
                Some(target_id) if target_id != from && registry.is_member(room_id, &target_id) => {
                    vec![target_id]
                }
                Some(target_id) => {
                    warn!(
                        "Dropping envelope from {} to unknown target {} in '{}'",
                        from, target_id, room_id
                    );
                    return Err(RelayError::UnknownTarget {
                        target_id,
                        room_id: room_id.clone(),
                    });
                }
                None => registry
                    .members(room_id)
                    .into_iter()
                    .filter(|id| id != &from)
                    .collect(),
            }
        };

        for recipient in &recipients {
            self.output.deliver(*recipient, signal.clone()).await;
        }

        Ok(recipients.len())
    }

    pub fn room_count(&self) -> usize {
        self.registry().room_count()
    }

    pub fn session_count(&self) -> usize {
        self.registry().session_count()
    }

    pub fn members(&self, room_id: &RoomId) -> Vec<PeerId> {
        self.registry().members(room_id)
    }

    async fn announce_departure(&self, peer_id: PeerId, outcome: &LeaveOutcome) {
        info!(
            "Peer {} left '{}', notifying {} member(s)",
            peer_id,
            outcome.room_id,
            outcome.remaining.len()
        );

        for member in &outcome.remaining {
            self.output
                .deliver(*member, ServerSignal::PeerLeft { peer_id })
                .await;
        }

        if let Some(host) = outcome.promoted {
            self.output
                .deliver(host, ServerSignal::Role { role: Role::Host })
                .await;
        }
    }

    fn registry(&self) -> MutexGuard<'_, RoomRegistry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
