use crate::types::{Address, NodeId, Sequence};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct InFlightWrite {
    pub replicas: Vec<NodeId>,
    pub remaining: usize,
    pub reply_to: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    Waiting(usize),
    Completed(Option<String>),
    Unknown,
}

/// Writes whose replication has not been acknowledged by every replica yet.
///
/// Acks carry only `(address, sequence)`, so each replica is expected to ack a
/// given REPLICATE once.
#[derive(Default)]
pub struct InFlightTable {
    entries: Mutex<HashMap<(Address, Sequence), InFlightWrite>>,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        address: Address,
        sequence: Sequence,
        replicas: &[NodeId],
        reply_to: Option<String>,
    ) {
        let write = InFlightWrite {
            replicas: replicas.to_vec(),
            remaining: replicas.len(),
            reply_to,
            started_at: Utc::now(),
        };
        self.entries.lock().unwrap().insert((address, sequence), write);
    }

    /// Counts one ack. Decrement, zero check and removal happen under one lock,
    /// so at most one caller ever sees `Completed` for a key.
    pub fn acknowledge(&self, address: Address, sequence: Sequence) -> AckOutcome {
        let mut entries = self.entries.lock().unwrap();
        let Some(write) = entries.get_mut(&(address, sequence)) else {
            return AckOutcome::Unknown;
        };

        write.remaining = write.remaining.saturating_sub(1);
        if write.remaining > 0 {
            return AckOutcome::Waiting(write.remaining);
        }

        match entries.remove(&(address, sequence)) {
            Some(done) => AckOutcome::Completed(done.reply_to),
            None => AckOutcome::Unknown,
        }
    }

    pub fn outstanding(&self, address: Address, sequence: Sequence) -> Option<usize> {
        self.entries
            .lock()
            .unwrap()
            .get(&(address, sequence))
            .map(|w| w.remaining)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn expire(&self, cutoff: DateTime<Utc>) -> Vec<((Address, Sequence), InFlightWrite)> {
        let mut entries = self.entries.lock().unwrap();
        let stale: Vec<_> = entries
            .iter()
            .filter(|(_, w)| w.started_at <= cutoff)
            .map(|(key, _)| *key)
            .collect();

        stale
            .into_iter()
            .filter_map(|key| entries.remove(&key).map(|w| (key, w)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRead {
    pub address: Address,
    pub sequence: Sequence,
    pub reply_to: Option<String>,
    pub deferred_at: DateTime<Utc>,
}

impl PendingRead {
    pub fn new(address: Address, sequence: Sequence, reply_to: Option<String>) -> Self {
        Self {
            address,
            sequence,
            reply_to,
            deferred_at: Utc::now(),
        }
    }
}

/// Reads waiting for the watermark to reach their sequence, ordered by sequence.
#[derive(Default)]
pub struct DeferredReads {
    entries: Mutex<BTreeMap<Sequence, Vec<PendingRead>>>,
}

impl DeferredReads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks `read` if its sequence is ahead of `watermark()`, otherwise hands it
    /// back to be served now. The watermark is sampled while the table is locked;
    /// paired with `drain_up_to` (which runs after the watermark moved) a read
    /// can neither be stranded nor fired twice.
    pub fn defer_or_return(
        &self,
        read: PendingRead,
        watermark: impl FnOnce() -> Sequence,
    ) -> Option<PendingRead> {
        let mut entries = self.entries.lock().unwrap();
        if read.sequence > watermark() {
            entries.entry(read.sequence).or_default().push(read);
            None
        } else {
            Some(read)
        }
    }

    /// Removes and returns every read with sequence <= `watermark`, ascending.
    pub fn drain_up_to(&self, watermark: Sequence) -> Vec<PendingRead> {
        let mut entries = self.entries.lock().unwrap();
        let remaining = match watermark.checked_add(1) {
            Some(next) => entries.split_off(&next),
            None => BTreeMap::new(),
        };
        let ready = std::mem::replace(&mut *entries, remaining);
        ready.into_values().flatten().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn expire(&self, cutoff: DateTime<Utc>) -> Vec<PendingRead> {
        let mut entries = self.entries.lock().unwrap();
        let mut expired = Vec::new();
        for reads in entries.values_mut() {
            let (old, keep): (Vec<_>, Vec<_>) =
                reads.drain(..).partition(|r| r.deferred_at <= cutoff);
            expired.extend(old);
            *reads = keep;
        }
        entries.retain(|_, reads| !reads.is_empty());
        expired
    }
}
