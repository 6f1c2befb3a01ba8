//! Correlation store
//!
//! Address-keyed table of captured fingerprints waiting for their HTTP
//! request. Owned by exactly one task; no internal locking.

use log::debug;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::fingerprint::{ClientAddress, HandshakeFingerprint};

/// Bounds applied to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Entry lifetime; `None` keeps entries forever
    pub ttl: Option<Duration>,
    /// Maximum number of entries; `None` is unbounded
    pub capacity: Option<usize>,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::from_secs(3600)),
            capacity: Some(100_000),
        }
    }
}

impl StoreLimits {
    /// Build limits from configuration values, where `0` disables a bound
    pub fn from_config(ttl_secs: u64, capacity: usize) -> Self {
        Self {
            ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            capacity: (capacity > 0).then_some(capacity),
        }
    }
}

/// Outcome of an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A live entry already exists for the address
    Kept,
}

#[derive(Debug)]
struct Entry {
    fingerprint: Arc<HandshakeFingerprint>,
    inserted: Instant,
    /// Matches the generation stored in `order`
    generation: u64,
}

/// Fingerprints keyed by client address, first hello wins
#[derive(Debug)]
pub struct CorrelationStore {
    entries: HashMap<ClientAddress, Entry>,
    /// Insertion order; stale generations are skipped lazily
    order: VecDeque<(ClientAddress, u64)>,
    limits: StoreLimits,
    next_generation: u64,
}

impl CorrelationStore {
    /// Create an empty store
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            limits,
            next_generation: 0,
        }
    }

    /// Number of live or not-yet-pruned entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        match self.limits.ttl {
            Some(ttl) => now.saturating_duration_since(entry.inserted) >= ttl,
            None => false,
        }
    }

    /// Insert a fingerprint unless a live entry exists for the address
    ///
    /// # Parameters
    ///
    /// * `address` - Correlation key
    /// * `fingerprint` - Captured handshake
    /// * `now` - Current time, used for expiry
    ///
    /// # Returns
    ///
    /// Whether the fingerprint was stored or the existing one kept
    pub fn insert(
        &mut self,
        address: ClientAddress,
        fingerprint: HandshakeFingerprint,
        now: Instant,
    ) -> InsertOutcome {
        if let Some(existing) = self.entries.get(&address) {
            if !self.is_expired(existing, now) {
                return InsertOutcome::Kept;
            }
            debug!("Replacing expired fingerprint for {}", address);
            self.entries.remove(&address);
        }

        if let Some(capacity) = self.limits.capacity {
            while self.entries.len() >= capacity {
                if !self.evict_oldest() {
                    break;
                }
            }
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.entries.insert(
            address,
            Entry {
                fingerprint: Arc::new(fingerprint),
                inserted: now,
                generation,
            },
        );
        self.order.push_back((address, generation));
        InsertOutcome::Inserted
    }

    /// Look up the fingerprint for an address without removing it
    pub fn get(&self, address: &ClientAddress, now: Instant) -> Option<Arc<HandshakeFingerprint>> {
        self.entries
            .get(address)
            .filter(|entry| !self.is_expired(entry, now))
            .map(|entry| Arc::clone(&entry.fingerprint))
    }

    /// Remove the least recently inserted live entry
    fn evict_oldest(&mut self) -> bool {
        while let Some((address, generation)) = self.order.pop_front() {
            let current = self.entries.get(&address).map(|e| e.generation);
            if current == Some(generation) {
                self.entries.remove(&address);
                debug!("Evicted fingerprint for {} (store full)", address);
                return true;
            }
        }
        false
    }

    /// Drop every expired entry
    ///
    /// # Returns
    ///
    /// The number of entries removed
    pub fn prune(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.limits.ttl else {
            return 0;
        };

        let mut removed = 0;
        // Entries are ordered by insertion time, so expiry stops at the first live one
        while let Some(&(address, generation)) = self.order.front() {
            match self.entries.get(&address) {
                Some(entry) if entry.generation == generation => {
                    if now.saturating_duration_since(entry.inserted) < ttl {
                        break;
                    }
                    self.entries.remove(&address);
                    removed += 1;
                }
                _ => {}
            }
            self.order.pop_front();
        }

        if removed > 0 {
            debug!("Pruned {} expired fingerprints", removed);
        }
        removed
    }
}
