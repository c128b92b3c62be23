use bytes::Bytes;
use meshlink_core::PeerId;

/// Events a transport raises for the link that owns it. Each carries the remote peer id.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Local ICE candidate to trickle to the remote side through the relay.
    CandidateGenerated(PeerId, String),

    /// The connection reached the connected state, for the first time or again.
    Connected(PeerId),

    /// The data channel is open and writable.
    ChannelOpen(PeerId),

    ChannelClosed(PeerId),

    Message(PeerId, Bytes),

    /// The remote side attached a media track.
    RemoteTrack {
        peer_id: PeerId,
        track_id: String,
        kind: String,
    },

    /// The underlying connection failed or was closed. Transient drops are not reported.
    Disconnected(PeerId),
}
