//! Traversal: detached safe/unsafe cursors and a borrowing iterator.
//!
//! A `DictIter` does not borrow the dict between steps, so the caller may
//! mutate it mid-walk. The two modes differ in what they promise:
//! - `Safe` pins the table pair by pausing rehashing until release; inserts
//!   and deletes by the caller are tolerated.
//! - `Unsafe` pins nothing. It snapshots a structural fingerprint on the
//!   first step and release reports `ConcurrentStructuralMutation` if the
//!   shape changed.
//!
//! Cursors are linear: they must be handed back through `release`, and
//! dropping a started cursor without it panics.

use crate::dict::{Dict, Handle};
use crate::error::DictError;
use slotmap::DefaultKey;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IterMode {
    Safe,
    Unsafe,
}

/// Cursor over one or both tables in bucket-major, chain order.
#[derive(Debug)]
pub struct DictIter {
    mode: IterMode,
    table: usize,
    bucket: u64,
    entry: Option<DefaultKey>,
    // Successor of `entry`, read before `entry` is handed out.
    next_entry: Option<DefaultKey>,
    // Entries already produced from the current bucket.
    visited: Vec<DefaultKey>,
    fingerprint: i64,
    started: bool,
    released: bool,
}

impl DictIter {
    pub fn new(mode: IterMode) -> Self {
        Self {
            mode,
            table: 0,
            bucket: 0,
            entry: None,
            next_entry: None,
            visited: Vec::new(),
            fingerprint: 0,
            started: false,
            released: false,
        }
    }

    pub fn mode(&self) -> IterMode {
        self.mode
    }

    /// Advance to the next entry. The first call pins the dict (safe) or
    /// takes the fingerprint snapshot (unsafe).
    pub fn next<K, V, S>(&mut self, dict: &mut Dict<K, V, S>) -> Option<Handle> {
        if !self.started {
            self.started = true;
            match self.mode {
                IterMode::Safe => dict.safe_iterators += 1,
                IterMode::Unsafe => self.fingerprint = dict.fingerprint(),
            }
        }
        loop {
            self.entry = match self.entry {
                Some(cur) => self.successor(dict, cur),
                None => {
                    if self.bucket >= dict.tables[self.table].size {
                        if !dict.is_rehashing() || self.table != 0 {
                            return None;
                        }
                        self.table = 1;
                        self.bucket = 0;
                    }
                    self.visited.clear();
                    let head = dict.tables[self.table].head(self.bucket);
                    self.bucket += 1;
                    head
                }
            };
            if let Some(slot) = self.entry {
                self.visited.push(slot);
                self.next_entry = dict.entries.get(slot).and_then(|e| e.next);
                return Some(Handle::new(slot));
            }
        }
    }

    /// First unvisited live entry after `cur` in the current bucket.
    ///
    /// A live `cur` has its link patched by every unlink, so it is followed
    /// directly. A deleted `cur` resumes from the successor saved when it
    /// was produced, or from the bucket head if that one is gone too.
    fn successor<K, V, S>(&self, dict: &Dict<K, V, S>, cur: DefaultKey) -> Option<DefaultKey> {
        let mut next = match dict.entries.get(cur) {
            Some(e) => e.next,
            None => match self.next_entry.filter(|&k| dict.entries.contains_key(k)) {
                Some(k) => Some(k),
                None => dict.tables[self.table].head(self.bucket.saturating_sub(1)),
            },
        };
        while let Some(k) = next {
            if !self.visited.contains(&k) {
                return Some(k);
            }
            next = dict.entries.get(k).and_then(|e| e.next);
        }
        None
    }

    /// Hand the cursor back. Unpins a safe cursor; checks the fingerprint
    /// of an unsafe one. A cursor that never advanced releases trivially.
    pub fn release<K, V, S>(mut self, dict: &mut Dict<K, V, S>) -> Result<(), DictError> {
        self.released = true;
        if !self.started {
            return Ok(());
        }
        match self.mode {
            IterMode::Safe => {
                debug_assert!(dict.safe_iterators > 0);
                dict.safe_iterators -= 1;
                Ok(())
            }
            IterMode::Unsafe => {
                let actual = dict.fingerprint();
                if actual != self.fingerprint {
                    return Err(DictError::ConcurrentStructuralMutation {
                        expected: self.fingerprint,
                        actual,
                    });
                }
                Ok(())
            }
        }
    }
}

impl Drop for DictIter {
    fn drop(&mut self) {
        // Fail fast on misuse, but never turn an unwind into an abort.
        if self.started && !self.released && !std::thread::panicking() {
            panic!("DictIter dropped without release");
        }
    }
}

/// Thomas Wang's 64-bit integer mix, folded over each field in turn.
fn fold_fingerprint(metas: [i64; 6]) -> i64 {
    let mut hash: i64 = 0;
    for meta in metas {
        hash = hash.wrapping_add(meta);
        hash = (hash << 21).wrapping_sub(hash).wrapping_sub(1);
        hash ^= hash >> 24;
        hash = hash.wrapping_add(hash << 3).wrapping_add(hash << 8);
        hash ^= hash >> 14;
        hash = hash.wrapping_add(hash << 2).wrapping_add(hash << 4);
        hash ^= hash >> 28;
        hash = hash.wrapping_add(hash << 31);
    }
    hash
}

impl<K, V, S> Dict<K, V, S> {
    /// Summary of the dict's shape: storage generation, size and occupancy
    /// of both tables.
    pub(crate) fn fingerprint(&self) -> i64 {
        let [t0, t1] = &self.tables;
        fold_fingerprint([
            t0.generation as i64,
            t0.size as i64,
            t0.used as i64,
            t1.generation as i64,
            t1.size as i64,
            t1.used as i64,
        ])
    }

    pub fn iter_safe(&self) -> DictIter {
        DictIter::new(IterMode::Safe)
    }

    pub fn iter_unsafe(&self) -> DictIter {
        DictIter::new(IterMode::Unsafe)
    }

    /// Call `f` for each entry until it returns false, without pausing
    /// rehashing. `f` may read and overwrite values but must not change the
    /// dict's shape; doing so is reported as `ConcurrentStructuralMutation`.
    pub fn range<F>(&mut self, f: F) -> Result<(), DictError>
    where
        F: FnMut(&mut Self, Handle) -> bool,
    {
        self.range_with(IterMode::Unsafe, f)
    }

    /// Call `f` for each entry until it returns false. Rehashing is paused
    /// for the walk, so `f` may insert and delete freely.
    pub fn range_safely<F>(&mut self, f: F)
    where
        F: FnMut(&mut Self, Handle) -> bool,
    {
        let released = self.range_with(IterMode::Safe, f);
        debug_assert!(released.is_ok(), "safe release failed: {:?}", released);
    }

    fn range_with<F>(&mut self, mode: IterMode, mut f: F) -> Result<(), DictError>
    where
        F: FnMut(&mut Self, Handle) -> bool,
    {
        let mut walk = Walk {
            dict: self,
            cursor: Some(DictIter::new(mode)),
        };
        loop {
            let next = match walk.cursor.as_mut() {
                Some(it) => it.next(&mut *walk.dict),
                None => None,
            };
            match next {
                Some(h) if f(&mut *walk.dict, h) => {}
                _ => break,
            }
        }
        walk.finish()
    }

    /// Borrowing iterator over `(&K, &V)` in traversal order.
    pub fn iter(&self) -> Iter<'_, K, V, S> {
        Iter {
            dict: self,
            table: 0,
            bucket: 0,
            entry: None,
        }
    }
}

/// Cursor bound to the dict it walks. Releases the cursor when dropped, so
/// a callback unwinding out of `range`/`range_safely` still unpins.
struct Walk<'a, K, V, S> {
    dict: &'a mut Dict<K, V, S>,
    cursor: Option<DictIter>,
}

impl<'a, K, V, S> Walk<'a, K, V, S> {
    fn finish(mut self) -> Result<(), DictError> {
        match self.cursor.take() {
            Some(it) => it.release(&mut *self.dict),
            None => Ok(()),
        }
    }
}

impl<'a, K, V, S> Drop for Walk<'a, K, V, S> {
    fn drop(&mut self) {
        // Only reached with a cursor when unwinding out of a callback.
        if let Some(it) = self.cursor.take() {
            let _ = it.release(&mut *self.dict);
        }
    }
}

/// Iterator over immutable entries in `Dict`.
pub struct Iter<'a, K, V, S> {
    dict: &'a Dict<K, V, S>,
    table: usize,
    bucket: u64,
    entry: Option<DefaultKey>,
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let dict = self.dict;
        loop {
            if let Some(slot) = self.entry {
                let e = &dict.entries[slot];
                self.entry = e.next;
                return Some((&e.key, &e.value));
            }
            let table = &dict.tables[self.table];
            if self.bucket >= table.size {
                if self.table == 0 && dict.is_rehashing() {
                    self.table = 1;
                    self.bucket = 0;
                    continue;
                }
                return None;
            }
            self.entry = table.head(self.bucket);
            self.bucket += 1;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, usize::try_from(self.dict.len()).ok())
    }
}

impl<'a, K, V, S> IntoIterator for &'a Dict<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
