//! rehash-dict: a single-threaded hash map that grows and shrinks by
//! progressive rehashing, built as the key-value primitive of a store.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: never pay for a resize in one call. A resize allocates a second
//!   table and every later operation migrates one bucket into it.
//! - Layers:
//!   - HashTable: one allocation of bucket heads plus size/mask/used and a
//!     generation number identifying the allocation.
//!   - Dict<K, V, S>: two HashTable slots, the entry arena, the rehash
//!     cursor and the count of active safe iterators.
//!   - DictIter: detached cursor in safe or unsafe mode; `range` and
//!     `range_safely` wrap it so release always runs.
//!
//! Storage
//! - Entries live in a generational arena (`slotmap`); buckets and chain
//!   links are arena keys. Migration unlinks a chain and relinks the same
//!   slots into the destination, so no entry is ever in two tables.
//! - Each entry stores its hash; migration never calls the hasher again.
//! - `Handle` wraps an arena key. A deleted entry's handle stops resolving
//!   even if the slot is reused.
//!
//! Rehash state machine
//! - Stable (`rehash_idx == -1`): everything lives in `tables[0]`.
//! - Rehashing (`rehash_idx >= 0`): `tables[0]` drains into `tables[1]`,
//!   new entries go to `tables[1]`, lookups consult both.
//! - Growth doubles when occupancy reaches the table size. Shrinking is
//!   manual (`resize`). `resize`/`resize_to` are rejected mid-rehash.
//! - `rehash_for_duration` drains in batches under a time budget.
//!
//! Iteration
//! - Safe: pauses rehashing while started; the caller may insert and delete.
//! - Unsafe: pins nothing; a fingerprint over both tables' generation, size
//!   and occupancy is compared at release and a mismatch is reported as
//!   `DictError::ConcurrentStructuralMutation`.
//!
//! Hashing
//! - Keys are hashed through `KeyHasher`. Every `BuildHasher` is one (the
//!   default is hashbrown's); `SipKeyHasher` handles dynamically typed keys
//!   and fails with `UnsupportedKeyType` for variants it cannot encode.
//!
//! Notes and non-goals
//! - Not thread-safe. No expiry, persistence or value introspection.

mod dict;
#[cfg(test)]
mod dict_proptest;
mod error;
mod hash;
mod iter;
mod rehash;
mod stats;
mod table;

// Public surface
pub use dict::{next_power, Dict, Handle, INITIAL_SIZE, MAX_SIZE};
pub use error::DictError;
pub use hash::{Key, KeyHasher, SipKeyHasher, DEFAULT_SIP_KEY};
pub use iter::{DictIter, IterMode, Iter};
pub use stats::TableStats;
