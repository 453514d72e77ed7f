// In-memory dedup caches that follow the database transaction state

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Key to id cache whose recent inserts can be undone.
///
/// Entries are `stage`d as soon as their row is inserted and become
/// permanent on `commit`. `rewind` drops everything staged after a
/// checkpoint so the cache never names rows that a rollback removed.
#[derive(Debug)]
pub struct IdCache<K, V> {
    entries: HashMap<K, V>,
    staged: Vec<K>,
}

impl<K, V> IdCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Copy,
{
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            staged: Vec::new(),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.get(key).copied()
    }

    pub fn stage(&mut self, key: K, value: V) {
        self.staged.push(key.clone());
        self.entries.insert(key, value);
    }

    pub fn checkpoint(&self) -> usize {
        self.staged.len()
    }

    pub fn rewind(&mut self, checkpoint: usize) {
        if checkpoint >= self.staged.len() {
            return;
        }
        for key in self.staged.drain(checkpoint..) {
            self.entries.remove(&key);
        }
    }

    pub fn commit(&mut self) {
        self.staged.clear();
    }

    pub fn discard(&mut self) {
        self.rewind(0);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.staged.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for IdCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}
