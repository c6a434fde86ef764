//! Progressive migration from `tables[0]` into `tables[1]`.

use crate::dict::Dict;
use crate::table::HashTable;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Buckets migrated per call of the bulk loop.
const REHASH_BATCH: u64 = 100;
/// Empty source buckets a single step may skip before giving up.
const EMPTY_VISITS_PER_STEP: u64 = 10;

impl<K, V, S> Dict<K, V, S> {
    /// Migrate up to `n` non-empty buckets. Returns true when no rehash is
    /// left to do.
    ///
    /// At most `10 * n` empty buckets are skipped per call; a sparse source
    /// therefore stops the call early with the cursor kept for next time.
    pub fn rehash(&mut self, n: u64) -> bool {
        if !self.is_rehashing() {
            return true;
        }
        let mut empty_visits = n.saturating_mul(EMPTY_VISITS_PER_STEP);
        let mut steps = n;
        while steps > 0 && self.tables[0].used != 0 {
            // used != 0 keeps a non-empty bucket at or after the cursor.
            while self.tables[0].head(self.rehash_idx as u64).is_none() {
                self.rehash_idx += 1;
                empty_visits -= 1;
                if empty_visits == 0 {
                    return false;
                }
            }
            let bucket = self.rehash_idx as u64;
            let mut cur = self.tables[0].take_chain(bucket);
            let mut moved = 0u64;
            while let Some(slot) = cur {
                cur = self.entries[slot].next;
                self.tables[0].used -= 1;
                self.tables[1].link(&mut self.entries, slot);
                moved += 1;
            }
            trace!(bucket, moved, "bucket migrated");
            self.rehash_idx += 1;
            steps -= 1;
        }
        if self.tables[0].used == 0 {
            self.finish_rehash();
            return true;
        }
        false
    }

    fn finish_rehash(&mut self) {
        self.tables[0] = core::mem::replace(&mut self.tables[1], HashTable::empty());
        self.rehash_idx = -1;
        debug!(size = self.tables[0].size, used = self.tables[0].used, "rehash finished");
    }

    /// One opportunistic step, skipped while a safe iterator is active.
    pub(crate) fn rehash_step(&mut self) {
        if self.safe_iterators == 0 {
            self.rehash(1);
        }
    }

    /// Drain the rehash in batches of 100 buckets until it finishes or
    /// `max` has elapsed. Returns the number of buckets credited to the
    /// batches that did not finish the rehash.
    ///
    /// Does nothing while a safe iterator is active.
    pub fn rehash_for_duration(&mut self, max: Duration) -> u64 {
        if self.safe_iterators > 0 {
            debug!(safe_iterators = self.safe_iterators, "bulk rehash paused");
            return 0;
        }
        let start = Instant::now();
        let mut rehashes = 0u64;
        while !self.rehash(REHASH_BATCH) {
            rehashes += REHASH_BATCH;
            if start.elapsed() >= max {
                break;
            }
        }
        debug!(
            rehashes,
            finished = !self.is_rehashing(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "bulk rehash"
        );
        rehashes
    }
}
