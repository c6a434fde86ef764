//! Bucket storage: one generation of chain heads plus its bookkeeping.
//!
//! Entries live in the dict's arena; a table only stores arena keys. A
//! bucket holds the head of a singly linked chain threaded through
//! `Entry::next`. Moving an entry between tables is an unlink plus a
//! relink of the same arena slot.

use slotmap::{DefaultKey, SlotMap};

pub(crate) type Arena<K, V> = SlotMap<DefaultKey, Entry<K, V>>;

#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u64,
    pub(crate) next: Option<DefaultKey>,
}

#[derive(Debug)]
pub(crate) struct HashTable {
    buckets: Box<[Option<DefaultKey>]>,
    pub(crate) size: u64,
    pub(crate) sizemask: u64,
    pub(crate) used: u64,
    pub(crate) generation: u64,
}

impl HashTable {
    /// Unallocated shell: size 0, generation 0.
    pub(crate) fn empty() -> Self {
        Self {
            buckets: Box::new([]),
            size: 0,
            sizemask: 0,
            used: 0,
            generation: 0,
        }
    }

    /// Fresh storage of `size` buckets. `size` must be a power of two.
    pub(crate) fn with_size(size: u64, generation: u64) -> Self {
        debug_assert!(size.is_power_of_two());
        Self {
            buckets: vec![None; size as usize].into_boxed_slice(),
            size,
            sizemask: size - 1,
            used: 0,
            generation,
        }
    }

    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        self.size != 0
    }

    #[inline]
    pub(crate) fn bucket_of(&self, hash: u64) -> usize {
        (hash & self.sizemask) as usize
    }

    /// Head of bucket `idx`; `None` for empty or out-of-range buckets.
    #[inline]
    pub(crate) fn head(&self, idx: u64) -> Option<DefaultKey> {
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.buckets.get(i).copied().flatten())
    }

    /// Find the entry whose key satisfies `is_match` in the chain for `hash`.
    pub(crate) fn find<K, V, F>(
        &self,
        arena: &Arena<K, V>,
        hash: u64,
        mut is_match: F,
    ) -> Option<DefaultKey>
    where
        F: FnMut(&K) -> bool,
    {
        if !self.is_allocated() {
            return None;
        }
        let mut cur = self.buckets[self.bucket_of(hash)];
        while let Some(k) = cur {
            let e = &arena[k];
            if is_match(&e.key) {
                return Some(k);
            }
            cur = e.next;
        }
        None
    }

    /// Prepend `slot` to the chain for its stored hash and count it as used.
    pub(crate) fn link<K, V>(&mut self, arena: &mut Arena<K, V>, slot: DefaultKey) {
        let e = &mut arena[slot];
        let idx = self.bucket_of(e.hash);
        e.next = self.buckets[idx];
        self.buckets[idx] = Some(slot);
        self.used += 1;
    }

    /// Unlink the entry matching `is_match` from the chain for `hash`.
    /// The arena slot itself is left alone.
    pub(crate) fn unlink<K, V, F>(
        &mut self,
        arena: &mut Arena<K, V>,
        hash: u64,
        mut is_match: F,
    ) -> Option<DefaultKey>
    where
        F: FnMut(&K) -> bool,
    {
        if !self.is_allocated() {
            return None;
        }
        let idx = self.bucket_of(hash);
        let mut prev: Option<DefaultKey> = None;
        let mut cur = self.buckets[idx];
        while let Some(k) = cur {
            let next = arena[k].next;
            if is_match(&arena[k].key) {
                match prev {
                    Some(p) => arena[p].next = next,
                    None => self.buckets[idx] = next,
                }
                arena[k].next = None;
                self.used -= 1;
                return Some(k);
            }
            prev = Some(k);
            cur = next;
        }
        None
    }

    /// Detach the whole chain of bucket `idx`, returning its head. `used`
    /// is not touched; the caller moves the entries elsewhere.
    pub(crate) fn take_chain(&mut self, idx: u64) -> Option<DefaultKey> {
        self.buckets[idx as usize].take()
    }

    /// Number of entries chained in bucket `idx`.
    pub(crate) fn chain_len<K, V>(&self, arena: &Arena<K, V>, idx: u64) -> u64 {
        let mut n = 0;
        let mut cur = self.head(idx);
        while let Some(k) = cur {
            n += 1;
            cur = arena[k].next;
        }
        n
    }
}
