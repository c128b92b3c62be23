use crate::link::{LinkContext, LinkHandle, LinkSnapshot};
use meshlink_core::PeerId;
use std::collections::HashMap;
use tracing::debug;

/// At most one running link per remote peer.
#[derive(Default)]
pub struct LinkTable {
    links: HashMap<PeerId, LinkHandle>,
    next_generation: u64,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the link to `remote`, spawning it first if there is none.
    pub fn ensure(&mut self, ctx: &LinkContext, remote: PeerId) -> &mut LinkHandle {
        let next_generation = &mut self.next_generation;
        self.links.entry(remote).or_insert_with(|| {
            *next_generation += 1;
            debug!("Creating link to {}", remote);
            LinkHandle::spawn(ctx.clone(), remote, *next_generation)
        })
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&LinkHandle> {
        self.links.get(peer_id)
    }

    /// The link to `peer_id`, but only if it is the one that produced `generation`.
    pub fn current_mut(&mut self, peer_id: &PeerId, generation: u64) -> Option<&mut LinkHandle> {
        self.links
            .get_mut(peer_id)
            .filter(|link| link.generation() == generation)
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.links.contains_key(peer_id)
    }

    pub fn remove(&mut self, peer_id: &PeerId) -> Option<LinkHandle> {
        self.links.remove(peer_id)
    }

    pub fn drain(&mut self) -> Vec<LinkHandle> {
        self.links.drain().map(|(_, link)| link).collect()
    }

    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<_> = self.links.keys().copied().collect();
        peers.sort();
        peers
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkHandle> {
        self.links.values()
    }

    pub fn snapshots(&self) -> Vec<LinkSnapshot> {
        let mut snapshots: Vec<_> = self.links.values().map(LinkHandle::snapshot).collect();
        snapshots.sort_by_key(|snapshot| snapshot.peer_id);
        snapshots
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
