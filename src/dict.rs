//! Dict: two-table hash map with progressive rehashing.

use crate::error::DictError;
use crate::hash::KeyHasher;
use crate::table::{Arena, Entry, HashTable};
use core::borrow::Borrow;
use core::fmt;
use hashbrown::hash_map::DefaultHashBuilder;
use slotmap::{DefaultKey, SlotMap};
use tracing::{debug, warn};

/// Size of the first allocation and the floor of every resize.
pub const INITIAL_SIZE: u64 = 4;
/// Largest power of two a `u64` can hold; sizes saturate here.
pub const MAX_SIZE: u64 = 1 << 63;

/// Smallest power of two `>= n`, never below `INITIAL_SIZE` and never
/// above `MAX_SIZE`.
pub fn next_power(n: u64) -> u64 {
    if n >= MAX_SIZE {
        return MAX_SIZE;
    }
    n.max(INITIAL_SIZE).next_power_of_two()
}

/// Generational reference to one entry. Resolves to `None` once the entry
/// has been deleted, even if its arena slot was reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }

    pub fn key<'a, K, V, S>(&self, dict: &'a Dict<K, V, S>) -> Option<&'a K> {
        dict.entries.get(self.0).map(|e| &e.key)
    }

    pub fn value<'a, K, V, S>(&self, dict: &'a Dict<K, V, S>) -> Option<&'a V> {
        dict.entries.get(self.0).map(|e| &e.value)
    }

    pub fn value_mut<'a, K, V, S>(&self, dict: &'a mut Dict<K, V, S>) -> Option<&'a mut V> {
        dict.entries.get_mut(self.0).map(|e| &mut e.value)
    }
}

/// Hash map made of two tables so that growing and shrinking can be spread
/// over many calls.
///
/// While stable, everything lives in `tables[0]`. A resize allocates
/// `tables[1]` and every later operation migrates one bucket of
/// `tables[0]` into it; when the source is drained the destination takes
/// its place. `rehash_for_duration` drains in bulk.
///
/// Not thread-safe; mutation requires `&mut self`.
pub struct Dict<K, V, S = DefaultHashBuilder> {
    hasher: S,
    pub(crate) entries: Arena<K, V>,
    pub(crate) tables: [HashTable; 2],
    /// -1 while stable, otherwise the next source bucket to migrate.
    pub(crate) rehash_idx: i64,
    /// Started safe iterators; while > 0 rehashing is paused.
    pub(crate) safe_iterators: u64,
    generations: u64,
}

impl<K, V> Dict<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for Dict<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> Dict<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            entries: SlotMap::with_key(),
            tables: [HashTable::empty(), HashTable::empty()],
            rehash_idx: -1,
            safe_iterators: 0,
            generations: 0,
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn len(&self) -> u64 {
        self.tables[0].used + self.tables[1].used
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the table new entries go to: the incoming one while
    /// rehashing, the active one otherwise.
    pub fn capacity(&self) -> u64 {
        if self.is_rehashing() {
            self.tables[1].size
        } else {
            self.tables[0].size
        }
    }

    #[inline]
    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx >= 0
    }

    /// Drop every entry and release both tables.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.tables = [HashTable::empty(), HashTable::empty()];
        self.rehash_idx = -1;
    }

    /// Shrink (or grow) to the smallest size holding the current entries.
    pub fn resize(&mut self) -> Result<(), DictError> {
        if self.is_rehashing() {
            return Err(DictError::RehashInProgress);
        }
        self.resize_to(self.tables[0].used.max(INITIAL_SIZE))
    }

    /// Start moving to a table of `next_power(requested)` buckets.
    ///
    /// The very first allocation goes straight into the active slot; any
    /// later one becomes the rehash destination.
    pub fn resize_to(&mut self, requested: u64) -> Result<(), DictError> {
        if self.is_rehashing() {
            return Err(DictError::RehashInProgress);
        }
        let used = self.tables[0].used;
        if requested < used {
            return Err(DictError::InvalidTarget { requested, used });
        }
        let size = next_power(requested);
        if size == self.tables[0].size {
            return Ok(());
        }
        let table = self.allocate(size);
        if !self.tables[0].is_allocated() {
            self.tables[0] = table;
        } else {
            debug!(from = self.tables[0].size, to = size, used, "rehash started");
            self.tables[1] = table;
            self.rehash_idx = 0;
        }
        Ok(())
    }

    fn allocate(&mut self, size: u64) -> HashTable {
        self.generations += 1;
        HashTable::with_size(size, self.generations)
    }

    fn expand_if_needed(&mut self) -> Result<(), DictError> {
        if self.is_rehashing() {
            return Ok(());
        }
        let t = &self.tables[0];
        if t.used == 0 {
            return self.resize_to(INITIAL_SIZE);
        }
        // Inserts made while a rehash was pinned can leave `used` past twice
        // the size; the target must still hold every entry.
        if t.used >= t.size {
            let target = t.size.saturating_mul(2).max(t.used.saturating_add(1));
            return self.resize_to(target);
        }
        Ok(())
    }

    /// Entry for `key` in either live table.
    pub(crate) fn locate<Q>(&self, hash: u64, key: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        for table in &self.tables {
            if let Some(slot) = table.find(&self.entries, hash, |k| k.borrow() == key) {
                return Some(slot);
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    pub fn load<Q>(&mut self, key: &Q) -> Result<Option<&V>, DictError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        S: KeyHasher<Q>,
    {
        let hash = self.hasher.hash_key(key)?;
        self.rehash_step();
        Ok(self.locate(hash, key).map(|slot| &self.entries[slot].value))
    }

    pub fn load_mut<Q>(&mut self, key: &Q) -> Result<Option<&mut V>, DictError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        S: KeyHasher<Q>,
    {
        let hash = self.hasher.hash_key(key)?;
        self.rehash_step();
        Ok(self
            .locate(hash, key)
            .map(|slot| &mut self.entries[slot].value))
    }

    pub fn contains_key<Q>(&mut self, key: &Q) -> Result<bool, DictError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        S: KeyHasher<Q>,
    {
        Ok(self.load(key)?.is_some())
    }

    /// Insert `key -> value`, replacing the value of an existing key.
    /// Returns the replaced value.
    pub fn store(&mut self, key: K, value: V) -> Result<Option<V>, DictError>
    where
        K: Eq,
        S: KeyHasher<K>,
    {
        match self.find_or_insert(key, value)? {
            (slot, Some(value)) => Ok(Some(core::mem::replace(
                &mut self.entries[slot].value,
                value,
            ))),
            (_, None) => Ok(None),
        }
    }

    /// Look `key` up and insert `value` only when absent. The flag is true
    /// when the entry already existed (its value is left as it was).
    pub fn load_or_store(&mut self, key: K, value: V) -> Result<(Handle, bool), DictError>
    where
        K: Eq,
        S: KeyHasher<K>,
    {
        let (slot, unused) = self.find_or_insert(key, value)?;
        Ok((Handle::new(slot), unused.is_some()))
    }

    /// Shared path of `store`/`load_or_store`. Hands `value` back when the
    /// key was already present.
    fn find_or_insert(&mut self, key: K, value: V) -> Result<(DefaultKey, Option<V>), DictError>
    where
        K: Eq,
        S: KeyHasher<K>,
    {
        let hash = self.hasher.hash_key(&key)?;
        self.rehash_step();
        if let Err(err) = self.expand_if_needed() {
            warn!(%err, len = self.len(), "automatic expansion failed");
        }
        if let Some(slot) = self.locate(hash, &key) {
            return Ok((slot, Some(value)));
        }
        let slot = self.entries.insert(Entry {
            key,
            value,
            hash,
            next: None,
        });
        let target = if self.is_rehashing() { 1 } else { 0 };
        self.tables[target].link(&mut self.entries, slot);
        Ok((slot, None))
    }

    /// Remove `key`, returning its value. Absent keys are a no-op.
    pub fn delete<Q>(&mut self, key: &Q) -> Result<Option<V>, DictError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        S: KeyHasher<Q>,
    {
        if self.is_empty() {
            return Ok(None);
        }
        let hash = self.hasher.hash_key(key)?;
        self.rehash_step();
        for i in 0..2 {
            let unlinked =
                self.tables[i].unlink(&mut self.entries, hash, |k| k.borrow() == key);
            if let Some(slot) = unlinked {
                return Ok(self.entries.remove(slot).map(|e| e.value));
            }
            if !self.is_rehashing() {
                break;
            }
        }
        Ok(None)
    }
}

impl<K, V, S> fmt::Display for Dict<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dict(len = {}, cap = {}, isRehash = {} )",
            self.len(),
            self.capacity(),
            self.is_rehashing()
        )
    }
}

impl<K, V, S> fmt::Debug for Dict<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dict")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("rehash_idx", &self.rehash_idx)
            .field("safe_iterators", &self.safe_iterators)
            .finish()
    }
}
