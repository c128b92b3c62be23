use std::collections::VecDeque;

/// Remote candidates that arrived before the remote description.
#[derive(Debug, Default)]
pub struct PendingCandidates {
    queue: VecDeque<String>,
}

impl PendingCandidates {
    pub fn push(&mut self, candidate: String) {
        self.queue.push_back(candidate);
    }

    /// Empties the queue, yielding candidates in arrival order.
    pub fn drain(&mut self) -> Vec<String> {
        self.queue.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
