//! Tick-scheduled deferred effects
//!
//! Entries carry plain data rather than closures so the timer can be cloned,
//! hashed and serialized along with the rest of the game state. The owner
//! interprets fired entries (see `sim::state::TimedEffect`).

use serde::{Deserialize, Serialize};

/// One scheduled entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerEntry<T> {
    /// Timer tick at which the entry fires
    pub target: u64,
    /// Scheduling order, breaks ties between equal targets
    pub seq: u64,
    pub data: T,
}

/// Fires entries a fixed number of ticks after they were scheduled
///
/// Entries are kept sorted by `(target, seq)`, so due entries always come off
/// the front in FIFO order for equal targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickTimer<T> {
    tick: u64,
    next_seq: u64,
    entries: Vec<TimerEntry<T>>,
}

impl<T> Default for TickTimer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TickTimer<T> {
    pub fn new() -> Self {
        Self {
            tick: 0,
            next_seq: 0,
            entries: Vec::new(),
        }
    }

    /// Current timer tick (number of `advance` calls so far)
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Schedule `data` to fire `delay` ticks from now
    ///
    /// Zero and negative delays are accepted and fire on the next `advance`.
    /// Returns the target tick.
    pub fn schedule(&mut self, delay: i64, data: T) -> u64 {
        let target = self.tick + delay.max(1) as u64;
        let seq = self.next_seq;
        self.next_seq += 1;

        let at = self.entries.partition_point(|e| e.target <= target);
        self.entries.insert(at, TimerEntry { target, seq, data });
        target
    }

    /// Step the timer one tick and hand back every due entry, in firing order
    ///
    /// Entries scheduled after this returns land on a later tick, so firing
    /// never recurses into the same pass.
    pub fn advance(&mut self) -> Vec<T> {
        self.tick += 1;
        let due = self.entries.partition_point(|e| e.target <= self.tick);
        self.entries.drain(..due).map(|e| e.data).collect()
    }

    /// Like [`advance`](Self::advance), calling `fire` for each due entry
    ///
    /// `fire` gets the timer back so it may schedule follow-ups; those are
    /// queued for later ticks, never for the pass in progress.
    pub fn advance_with(&mut self, mut fire: impl FnMut(&mut Self, T)) {
        for data in self.advance() {
            fire(self, data);
        }
    }

    /// Drop every pending entry matching `pred`, returning how many went
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !pred(&e.data));
        before - self.entries.len()
    }

    /// Pending entries in firing order
    pub fn pending(&self) -> impl Iterator<Item = &TimerEntry<T>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_order_with_ties() {
        let mut timer = TickTimer::new();
        timer.schedule(3, 'A');
        timer.schedule(1, 'B');
        timer.schedule(1, 'C');

        let mut fired = Vec::new();
        for _ in 0..3 {
            fired.extend(timer.advance());
        }
        assert_eq!(fired, vec!['B', 'C', 'A']);
        assert!(timer.is_empty());
    }

    #[test]
    fn test_fires_exactly_on_target() {
        let mut timer = TickTimer::new();
        timer.schedule(2, 1u32);
        assert!(timer.advance().is_empty());
        assert_eq!(timer.advance(), vec![1]);
        assert!(timer.advance().is_empty());
    }

    #[test]
    fn test_zero_and_negative_delay_fire_next_advance() {
        let mut timer = TickTimer::new();
        timer.schedule(0, "zero");
        timer.schedule(-5, "negative");
        assert_eq!(timer.advance(), vec!["zero", "negative"]);
    }

    #[test]
    fn test_reschedule_during_fire_goes_to_later_tick() {
        let mut timer = TickTimer::new();
        timer.schedule(1, 0u32);

        let mut log = Vec::new();
        for _ in 0..3 {
            timer.advance_with(|t, n| {
                log.push((t.tick(), n));
                if n < 2 {
                    t.schedule(0, n + 1);
                }
            });
        }
        assert_eq!(log, vec![(1, 0), (2, 1), (3, 2)]);
    }

    #[test]
    fn test_cancel_where() {
        let mut timer = TickTimer::new();
        timer.schedule(1, 10);
        timer.schedule(1, 11);
        timer.schedule(2, 10);
        assert_eq!(timer.cancel_where(|&d| d == 10), 2);
        assert_eq!(timer.advance(), vec![11]);
    }
}
