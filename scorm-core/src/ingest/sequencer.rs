//! Per-connection sequence slot bookkeeping

use std::collections::BTreeMap;

use super::batch::Batch;

/// A slot that has arrived but may not have been applied yet
#[derive(Debug)]
pub(crate) enum Slot {
    Ready(Batch),
    /// Rejected; consumed without applying anything
    Forfeit,
}

/// Tracks which sequence slots a connection has consumed
///
/// Slots are consumed strictly in order. A slot that arrives ahead of its
/// predecessors is held until the gap closes.
#[derive(Debug, Default)]
pub struct Sequencer {
    next: u64,
    pending: BTreeMap<u64, Slot>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next slot to be applied
    pub fn next(&self) -> u64 {
        self.next
    }

    /// Batches waiting on a predecessor
    pub fn held(&self) -> usize {
        self.pending
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Whether `seq` was already applied, forfeited or is waiting
    pub fn is_consumed(&self, seq: u64) -> bool {
        seq < self.next || self.pending.contains_key(&seq)
    }

    pub(crate) fn hold(&mut self, seq: u64, batch: Batch) {
        self.pending.insert(seq, Slot::Ready(batch));
    }

    /// Mark a slot as consumed without a batch, unless it already is
    pub(crate) fn forfeit(&mut self, seq: u64) -> bool {
        if self.is_consumed(seq) {
            return false;
        }
        self.pending.insert(seq, Slot::Forfeit);
        true
    }

    /// Take the next slot if it has arrived
    pub(crate) fn pop_ready(&mut self) -> Option<(u64, Slot)> {
        let slot = self.pending.remove(&self.next)?;
        let seq = self.next;
        self.next += 1;
        Some((seq, slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(id: u64) -> Batch {
        Batch::new(id, Vec::new())
    }

    #[test]
    fn releases_slots_in_order_once_gap_closes() {
        let mut seq = Sequencer::new();
        seq.hold(2, batch(20));
        seq.hold(1, batch(10));
        assert!(seq.pop_ready().is_none());
        assert_eq!(seq.held(), 2);

        seq.hold(0, batch(0));
        let order: Vec<u64> = std::iter::from_fn(|| seq.pop_ready().map(|(s, _)| s)).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(seq.next(), 3);
        assert_eq!(seq.held(), 0);
    }

    #[test]
    fn forfeit_consumes_slot_once() {
        let mut seq = Sequencer::new();
        assert!(seq.forfeit(0));
        assert!(!seq.forfeit(0));
        assert_eq!(seq.held(), 0);
        assert!(matches!(seq.pop_ready(), Some((0, Slot::Forfeit))));
        assert!(seq.is_consumed(0));
        assert!(!seq.forfeit(0));
    }

    #[test]
    fn held_slots_count_as_consumed() {
        let mut seq = Sequencer::new();
        seq.hold(4, batch(4));
        assert!(seq.is_consumed(4));
        assert!(!seq.is_consumed(3));
    }
}
