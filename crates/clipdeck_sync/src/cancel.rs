//! Last-request-wins cancellation.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Issues [`Ticket`]s per logical operation key.
///
/// Issuing a ticket for a key makes every earlier ticket for that key
/// stale. An operation holding a stale ticket must discard its result
/// when it resolves, so the last request issued wins regardless of the
/// order in which requests resolve.
#[derive(Debug)]
pub struct Supersession<K> {
    generations: Arc<Mutex<HashMap<K, u64>>>,
}

impl<K> Clone for Supersession<K> {
    fn clone(&self) -> Self {
        Self {
            generations: Arc::clone(&self.generations),
        }
    }
}

impl<K: Eq + Hash + Clone> Default for Supersession<K> {
    fn default() -> Self {
        Self {
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Clone> Supersession<K> {
    /// Creates an empty supersession table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new ticket for `key`, superseding the previous one.
    pub fn issue(&self, key: K) -> Ticket<K> {
        let mut generations = self.generations.lock();
        let generation = generations.entry(key.clone()).or_insert(0);
        *generation += 1;
        Ticket {
            key,
            generation: *generation,
            generations: Arc::clone(&self.generations),
        }
    }

    /// Makes every outstanding ticket for `key` stale.
    pub fn cancel(&self, key: &K) {
        if let Some(generation) = self.generations.lock().get_mut(key) {
            *generation += 1;
        }
    }
}

/// Proof that an operation is still the latest for its key.
#[derive(Debug, Clone)]
pub struct Ticket<K> {
    key: K,
    generation: u64,
    generations: Arc<Mutex<HashMap<K, u64>>>,
}

impl<K: Eq + Hash> Ticket<K> {
    /// Returns true while no newer ticket was issued for the key.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.generations.lock().get(&self.key) == Some(&self.generation)
    }

    /// Key the ticket was issued for.
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }
}
