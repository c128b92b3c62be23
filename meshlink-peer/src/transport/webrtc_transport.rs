use crate::transport::{Transport, TransportConfig, TransportEvent, TransportFactory};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use meshlink_core::{IceServerConfig, PeerId};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

type ChannelSlot = Arc<Mutex<Option<Arc<RTCDataChannel>>>>;

/// [`Transport`] over a real `RTCPeerConnection` with a single data channel.
pub struct WebRtcTransport {
    remote: PeerId,
    label: String,
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: ChannelSlot,
    events: mpsc::Sender<TransportEvent>,
}

impl WebRtcTransport {
    pub async fn new(
        remote: PeerId,
        ice_servers: &[IceServerConfig],
        label: String,
        tracks: &[Arc<dyn TrackLocal + Send + Sync>],
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        for track in tracks {
            peer_connection
                .add_track(Arc::clone(track))
                .await
                .context("Failed to attach local track")?;
        }

        let state_tx = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();

                Box::pin(async move {
                    info!("Peer connection state with {} changed: {:?}", remote, s);
                    match s {
                        RTCPeerConnectionState::Connected => {
                            let _ = tx.send(TransportEvent::Connected(remote)).await;
                        }
                        RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed => {
                            let _ = tx.send(TransportEvent::Disconnected(remote)).await;
                        }
                        // may recover on its own
                        RTCPeerConnectionState::Disconnected => {}
                        _ => {}
                    }
                })
            },
        ));

        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(json_candidate) = candidate.to_json() else {
                    return;
                };
                let Ok(str_candidate) = serde_json::to_string(&json_candidate) else {
                    return;
                };
                let _ = tx
                    .send(TransportEvent::CandidateGenerated(remote, str_candidate))
                    .await;
            })
        }));

        // The answering side learns about the channel here
        let dc_tx = events.clone();
        let dc_slot: ChannelSlot = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&dc_slot);
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let slot = Arc::clone(&slot);

            Box::pin(async move {
                debug!("Remote data channel '{}' from {}", dc.label(), remote);
                wire_data_channel(&dc, remote, tx);
                *slot.lock().await = Some(dc);
            })
        }));

        let track_tx = events.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();

                Box::pin(async move {
                    let _ = tx
                        .send(TransportEvent::RemoteTrack {
                            peer_id: remote,
                            track_id: track.id(),
                            kind: track.kind().to_string(),
                        })
                        .await;
                })
            },
        ));

        Ok(Self {
            remote,
            label,
            peer_connection,
            data_channel: dc_slot,
            events,
        })
    }
}

fn wire_data_channel(dc: &Arc<RTCDataChannel>, remote: PeerId, tx: mpsc::Sender<TransportEvent>) {
    let tx_open = tx.clone();
    dc.on_open(Box::new(move || {
        let tx = tx_open.clone();
        Box::pin(async move {
            info!("Data channel with {} open", remote);
            let _ = tx.send(TransportEvent::ChannelOpen(remote)).await;
        })
    }));

    let tx_close = tx.clone();
    dc.on_close(Box::new(move || {
        let tx = tx_close.clone();
        Box::pin(async move {
            let _ = tx.send(TransportEvent::ChannelClosed(remote)).await;
        })
    }));

    let tx_msg = tx;
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = tx_msg.clone();
        Box::pin(async move {
            let _ = tx.send(TransportEvent::Message(remote, msg.data)).await;
        })
    }));
}

#[async_trait]
impl Transport for WebRtcTransport {
    async fn create_offer(&self) -> Result<String> {
        {
            let mut slot = self.data_channel.lock().await;
            if slot.is_none() {
                let dc = self
                    .peer_connection
                    .create_data_channel(&self.label, None)
                    .await?;
                wire_data_channel(&dc, self.remote, self.events.clone());
                *slot = Some(dc);
            }
        }

        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(offer.sdp)
    }

    /// Also drops the channel created for the discarded offer, so both sides end up on
    /// the channel the winning offer announced.
    async fn rollback(&self) -> Result<()> {
        let discarded = self.data_channel.lock().await.take();
        if let Some(dc) = discarded {
            debug!("Discarding our data channel to {}", self.remote);
            dc.on_open(Box::new(|| Box::pin(async {})));
            dc.on_close(Box::new(|| Box::pin(async {})));
            dc.on_message(Box::new(|_: DataChannelMessage| Box::pin(async {})));
            if let Err(e) = dc.close().await {
                debug!("Closing discarded channel to {} failed: {:?}", self.remote, e);
            }
        }

        let Some(pending) = self.peer_connection.pending_local_description().await else {
            debug!("No local offer to {} to roll back", self.remote);
            return Ok(());
        };
        // an empty sdp is only accepted for offers and answers
        let rollback: RTCSessionDescription =
            serde_json::from_value(serde_json::json!({ "type": "rollback", "sdp": pending.sdp }))
                .context("Failed to build rollback description")?;
        self.peer_connection.set_local_description(rollback).await?;
        Ok(())
    }

    async fn set_remote_offer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::offer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(answer.sdp)
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::answer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: String) -> Result<()> {
        let candidate: RTCIceCandidateInit =
            serde_json::from_str(&candidate).context("Failed to parse ICE candidate JSON")?;
        self.peer_connection.add_ice_candidate(candidate).await?;
        Ok(())
    }

    async fn send(&self, data: Bytes) -> Result<()> {
        let dc = self
            .data_channel
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("No data channel towards {}", self.remote))?;
        dc.send(&data).await?;
        Ok(())
    }

    async fn is_open(&self) -> bool {
        match self.data_channel.lock().await.as_ref() {
            Some(dc) => dc.ready_state() == RTCDataChannelState::Open,
            None => false,
        }
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Builds [`WebRtcTransport`]s, attaching the same local tracks to every connection.
#[derive(Clone, Default)]
pub struct WebRtcTransportFactory {
    config: TransportConfig,
    tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>,
}

impl WebRtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
        }
    }

    pub fn with_track(mut self, track: Arc<dyn TrackLocal + Send + Sync>) -> Self {
        self.tracks.push(track);
        self
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        _local: PeerId,
        remote: PeerId,
        ice_servers: &[IceServerConfig],
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn Transport>> {
        let ice_servers = if ice_servers.is_empty() {
            self.config.ice_servers.as_slice()
        } else {
            ice_servers
        };
        let transport = WebRtcTransport::new(
            remote,
            ice_servers,
            self.config.data_channel_label.clone(),
            &self.tracks,
            events,
        )
        .await?;
        Ok(Box::new(transport))
    }
}
