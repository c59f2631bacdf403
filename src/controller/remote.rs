//! Input arriving from the network peer, queued by tick

use std::collections::BTreeMap;

use crate::sim::Action;

#[derive(Debug, Clone, Default)]
pub struct RemoteController {
    queue: BTreeMap<u64, Action>,
}

impl RemoteController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the peer's action for `tick` (a repeat for the same tick wins)
    pub fn push(&mut self, tick: u64, action: Action) {
        self.queue.insert(tick, action);
    }

    pub fn has_input(&self, tick: u64) -> bool {
        self.queue.contains_key(&tick)
    }

    /// Take the action for `tick`, dropping anything older
    ///
    /// Missing input reads as no action; the arena checks
    /// [`has_input`](Self::has_input) first when it must not guess.
    pub fn tick(&mut self, tick: u64) -> Action {
        let action = self.queue.remove(&tick).unwrap_or_default();
        self.queue = self.queue.split_off(&tick);
        action
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
