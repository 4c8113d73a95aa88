use crate::types::{Address, Sequence};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot {
    pub value: i64,
    pub sequence: Sequence,
}

/// Storage for one partition plus the node's sequence counter.
///
/// On a primary the counter hands out write sequences; on a replica it is the
/// watermark of the highest applied REPLICATE. It only ever moves forward.
pub struct PartitionStore {
    start: u32,
    end: u32,
    slots: RwLock<HashMap<u32, Slot>>,
    watermark: AtomicU64,
}

impl PartitionStore {
    pub fn new(start: u32, end: u32) -> Self {
        let slots = (start..=end).map(|addr| (addr, Slot::default())).collect();
        Self {
            start,
            end,
            slots: RwLock::new(slots),
            watermark: AtomicU64::new(0),
        }
    }

    pub fn owns(&self, address: Address) -> bool {
        address.value() >= self.start && address.value() <= self.end
    }

    pub fn slot(&self, address: Address) -> Option<Slot> {
        self.slots.read().unwrap().get(&address.value()).copied()
    }

    pub fn read(&self, address: Address) -> Slot {
        self.slot(address).unwrap_or_default()
    }

    pub fn watermark(&self) -> Sequence {
        self.watermark.load(Ordering::SeqCst)
    }

    /// Assigns the next sequence and stores the value under the same lock, so
    /// local storage order always matches sequence order.
    pub fn write_next(&self, address: Address, value: i64) -> Sequence {
        let mut slots = self.slots.write().unwrap();
        let sequence = self.watermark.fetch_add(1, Ordering::SeqCst) + 1;
        slots.insert(address.value(), Slot { value, sequence });
        sequence
    }

    /// Applies a replicated value unless the slot already holds a newer one.
    pub fn apply(&self, address: Address, value: i64, sequence: Sequence) -> bool {
        let mut slots = self.slots.write().unwrap();
        let slot = slots.entry(address.value()).or_default();
        if sequence < slot.sequence {
            return false;
        }
        *slot = Slot { value, sequence };
        true
    }

    /// Raises the watermark to `sequence` if it is behind. Returns the watermark
    /// after the update.
    pub fn advance_watermark(&self, sequence: Sequence) -> Sequence {
        let previous = self.watermark.fetch_max(sequence, Ordering::SeqCst);
        previous.max(sequence)
    }
}
