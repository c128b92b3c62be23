use crate::link::{LinkState, PendingCandidates};
use crate::transport::Transport;
use anyhow::Result;
use meshlink_core::PeerId;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferOutcome {
    /// The remote offer was applied; send this answer back.
    Answer(String),
    /// Glare won by our own pending offer; the remote offer is dropped.
    KeptLocalOffer,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    Applied,
    Queued,
    Ignored,
}

/// Offer/answer state machine for one remote peer.
pub struct PeerLink {
    local: PeerId,
    remote: PeerId,
    state: LinkState,
    has_remote_description: bool,
    pending: PendingCandidates,
    transport: Box<dyn Transport>,
}

impl PeerLink {
    pub fn new(local: PeerId, remote: PeerId, transport: Box<dyn Transport>) -> Self {
        Self {
            local,
            remote,
            state: LinkState::New,
            has_remote_description: false,
            pending: PendingCandidates::default(),
            transport,
        }
    }

    pub fn remote(&self) -> PeerId {
        self.remote
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending.len()
    }

    /// During glare the lower peer id keeps its offer.
    pub fn wins_glare(&self) -> bool {
        self.local < self.remote
    }

    /// Produces a local offer, or `None` when one is already outstanding or the link is
    /// not in a state to offer.
    pub async fn start_offer(&mut self) -> Result<Option<String>> {
        match self.state {
            LinkState::New | LinkState::Stable => {}
            state => {
                debug!("Not offering to {} in state {}", self.remote, state);
                return Ok(None);
            }
        }

        let sdp = self.transport.create_offer().await?;
        self.state = LinkState::HaveLocalOffer;
        Ok(Some(sdp))
    }

    pub async fn handle_offer(&mut self, sdp: String) -> Result<OfferOutcome> {
        match self.state {
            LinkState::Closed | LinkState::Failed => return Ok(OfferOutcome::Ignored),
            LinkState::HaveLocalOffer if self.wins_glare() => {
                info!("Glare with {}: keeping our offer", self.remote);
                return Ok(OfferOutcome::KeptLocalOffer);
            }
            LinkState::HaveLocalOffer => {
                info!("Glare with {}: rolling back our offer", self.remote);
                self.transport.rollback().await?;
                self.state = self.settled_state();
            }
            _ => {}
        }

        self.transport.set_remote_offer(sdp).await?;
        self.state = LinkState::HaveRemoteOffer;
        self.has_remote_description = true;
        self.flush_candidates().await;

        let answer = self.transport.create_answer().await?;
        self.state = LinkState::Stable;
        Ok(OfferOutcome::Answer(answer))
    }

    /// Applies the answer to our outstanding offer. Returns `false` if there was none.
    pub async fn handle_answer(&mut self, sdp: String) -> Result<bool> {
        if self.state != LinkState::HaveLocalOffer {
            debug!("Dropping answer from {} in state {}", self.remote, self.state);
            return Ok(false);
        }

        self.transport.set_remote_answer(sdp).await?;
        self.has_remote_description = true;
        self.state = LinkState::Stable;
        self.flush_candidates().await;
        Ok(true)
    }

    pub async fn handle_candidate(&mut self, candidate: String) -> Result<CandidateOutcome> {
        match self.state {
            LinkState::Closed | LinkState::Failed => return Ok(CandidateOutcome::Ignored),
            _ if !self.has_remote_description => {
                self.pending.push(candidate);
                return Ok(CandidateOutcome::Queued);
            }
            _ => {}
        }

        self.transport.add_ice_candidate(candidate).await?;
        Ok(CandidateOutcome::Applied)
    }

    pub fn mark_failed(&mut self) {
        if self.state != LinkState::Closed {
            self.state = LinkState::Failed;
        }
    }

    /// Leaves `Failed` once the connection is usable again. Returns `true` if it did.
    pub fn recover(&mut self) -> bool {
        if self.state != LinkState::Failed {
            return false;
        }
        self.state = self.settled_state();
        true
    }

    pub async fn close(&mut self) -> Result<()> {
        if self.state == LinkState::Closed {
            return Ok(());
        }
        self.state = LinkState::Closed;
        self.pending.clear();
        self.transport.close().await
    }

    fn settled_state(&self) -> LinkState {
        if self.has_remote_description {
            LinkState::Stable
        } else {
            LinkState::New
        }
    }

    async fn flush_candidates(&mut self) {
        let queued = self.pending.drain();
        if queued.is_empty() {
            return;
        }

        debug!("Flushing {} queued candidates for {}", queued.len(), self.remote);
        for candidate in queued {
            if let Err(e) = self.transport.add_ice_candidate(candidate).await {
                warn!("Failed to apply queued candidate from {}: {:?}", self.remote, e);
            }
        }
    }
}
