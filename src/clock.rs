use serde::{Deserialize, Serialize};

use crate::peer::PeerId;

/// VectorClock tracks causality between distributed trading events.
///
/// Every peer keeps one logical counter per ring member, fixed length N.
/// A peer's own index moves forward on every send and on every
/// receive-merge, which lets the coordinator tell whether an incoming buy
/// request already incorporates everything the coordinator has seen.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct VectorClock {
    ticks: Vec<u64>,
}

impl VectorClock {
    /// Create an all-zero clock for a ring of `len` peers
    pub fn new(len: usize) -> Self {
        Self {
            ticks: vec![0; len],
        }
    }

    /// Build a clock from explicit counters
    pub fn from_ticks(ticks: Vec<u64>) -> Self {
        Self { ticks }
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn ticks(&self) -> &[u64] {
        &self.ticks
    }

    /// Get the logical timestamp recorded for a specific peer
    pub fn get(&self, peer_id: PeerId) -> u64 {
        self.ticks.get(peer_id).copied().unwrap_or(0)
    }

    /// Increment the logical timestamp for a given peer and return the new value
    pub fn increment(&mut self, peer_id: PeerId) -> u64 {
        let counter = &mut self.ticks[peer_id];
        *counter += 1;
        *counter
    }

    /// Update this clock by taking the elementwise maximum with another.
    /// Commutative, idempotent and associative.
    pub fn merge(&mut self, other: &VectorClock) {
        for (own, incoming) in self.ticks.iter_mut().zip(other.ticks.iter()) {
            *own = (*own).max(*incoming);
        }
    }

    /// Every index of self is <= the corresponding index of other
    pub fn is_smaller_or_equal(&self, other: &VectorClock) -> bool {
        self.ticks
            .iter()
            .zip(other.ticks.iter())
            .all(|(own, incoming)| own <= incoming)
    }

    /// Self happened strictly before other
    pub fn is_strictly_smaller(&self, other: &VectorClock) -> bool {
        self != other && self.is_smaller_or_equal(other)
    }

    /// Neither clock dominates the other
    pub fn is_concurrent(&self, other: &VectorClock) -> bool {
        !self.is_strictly_smaller(other) && !other.is_strictly_smaller(self)
    }

    /// Send protocol: advance the own index and return the clock value to
    /// attach to the outgoing message.
    pub fn record_send(&mut self, own: PeerId) -> VectorClock {
        self.increment(own);
        self.clone()
    }

    /// Receive-merge protocol: merge the incoming clock into the local one,
    /// then advance the own index.
    pub fn record_receive(&mut self, own: PeerId, incoming: &VectorClock) {
        self.merge(incoming);
        self.increment(own);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock_is_all_zero() {
        let clock = VectorClock::new(4);
        assert_eq!(clock.len(), 4);
        assert_eq!(clock.ticks(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_increment_advances_own_index() {
        let mut clock = VectorClock::new(3);

        assert_eq!(clock.increment(1), 1);
        assert_eq!(clock.increment(1), 2);
        assert_eq!(clock.increment(2), 1);

        assert_eq!(clock.get(0), 0);
        assert_eq!(clock.get(1), 2);
        assert_eq!(clock.get(2), 1);
    }

    #[test]
    fn test_merge_takes_maximum() {
        let mut clock1 = VectorClock::from_ticks(vec![1, 1, 0]);
        let clock2 = VectorClock::from_ticks(vec![2, 0, 1]);

        clock1.merge(&clock2);

        assert_eq!(clock1.ticks(), &[2, 1, 1]);
    }

    #[test]
    fn test_merge_is_commutative_and_idempotent() {
        let a = VectorClock::from_ticks(vec![3, 0, 2]);
        let b = VectorClock::from_ticks(vec![1, 4, 2]);

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        assert_eq!(ab, ba);

        let mut aa = a.clone();
        aa.merge(&a);
        assert_eq!(aa, a);
    }

    #[test]
    fn test_strictly_smaller_is_irreflexive_and_exclusive() {
        let a = VectorClock::from_ticks(vec![1, 2, 3]);
        let b = VectorClock::from_ticks(vec![2, 2, 3]);

        assert!(!a.is_strictly_smaller(&a));
        assert!(a.is_strictly_smaller(&b));
        assert!(!b.is_strictly_smaller(&a));
    }

    #[test]
    fn test_concurrent_clocks() {
        let a = VectorClock::from_ticks(vec![1, 0]);
        let b = VectorClock::from_ticks(vec![0, 1]);

        assert!(a.is_concurrent(&b));
        assert!(b.is_concurrent(&a));
        assert!(!a.is_strictly_smaller(&b));
        assert!(!b.is_strictly_smaller(&a));
    }

    #[test]
    fn test_equal_clocks_are_concurrent_but_not_smaller() {
        let a = VectorClock::from_ticks(vec![2, 2]);
        let b = a.clone();

        assert!(!a.is_strictly_smaller(&b));
        assert!(a.is_smaller_or_equal(&b));
        assert!(a.is_concurrent(&b));
    }

    #[test]
    fn test_send_and_receive_protocol() {
        // Peer 0 sends to peer 1, peer 1 replies, clocks stay causal.
        let mut sender = VectorClock::new(2);
        let mut receiver = VectorClock::new(2);

        let attached = sender.record_send(0);
        assert_eq!(attached.ticks(), &[1, 0]);

        receiver.record_receive(1, &attached);
        assert_eq!(receiver.ticks(), &[1, 1]);

        let reply = receiver.record_send(1);
        sender.record_receive(0, &reply);
        assert_eq!(sender.ticks(), &[2, 2]);

        assert!(attached.is_strictly_smaller(&sender));
    }

    #[test]
    fn test_complex_causality() {
        let mut clock1 = VectorClock::new(3);
        let mut clock2 = VectorClock::new(3);
        let mut clock3 = VectorClock::new(3);

        clock1.increment(0); // peer 0 does something: [1, 0, 0]

        clock2.merge(&clock1); // peer 1 learns about peer 0's event
        clock2.increment(1); // [1, 1, 0]

        clock3.merge(&clock2); // peer 2 learns about both events
        clock3.increment(2); // [1, 1, 1]

        assert!(clock1.is_strictly_smaller(&clock2));
        assert!(clock2.is_strictly_smaller(&clock3));
        assert!(clock1.is_strictly_smaller(&clock3));

        assert!(!clock1.is_concurrent(&clock2));
        assert!(!clock2.is_concurrent(&clock3));
    }
}
