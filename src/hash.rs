//! Key hashing collaborators.
//!
//! The dict never hashes keys itself; it asks a `KeyHasher` for a `u64`.
//! Any `BuildHasher` qualifies for keys implementing `Hash`. `SipKeyHasher`
//! serves stores whose keys are dynamically typed (`Key`) and rejects the
//! variants it has no stable byte encoding for.

use crate::error::DictError;
use core::hash::{BuildHasher, Hash, Hasher};
use siphasher::sip::SipHasher24;
use std::fmt;

/// Maps a key to a 64-bit hash. Must be deterministic for equal keys.
pub trait KeyHasher<K: ?Sized> {
    fn hash_key(&self, key: &K) -> Result<u64, DictError>;
}

impl<K, S> KeyHasher<K> for S
where
    K: ?Sized + Hash,
    S: BuildHasher,
{
    #[inline]
    fn hash_key(&self, key: &K) -> Result<u64, DictError> {
        Ok(self.hash_one(key))
    }
}

/// Dynamically typed key as handed over by a command layer.
#[derive(Clone, Debug)]
pub enum Key {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    List(Vec<Key>),
}

impl Key {
    pub fn type_name(&self) -> &'static str {
        match self {
            Key::Str(_) => "string",
            Key::Int(_) => "int",
            Key::UInt(_) => "uint",
            Key::Float(_) => "float",
            Key::List(_) => "list",
        }
    }
}

// Floats compare by bit pattern so that `Eq` holds.
impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Str(a), Key::Str(b)) => a == b,
            (Key::Int(a), Key::Int(b)) => a == b,
            (Key::UInt(a), Key::UInt(b)) => a == b,
            (Key::Float(a), Key::Float(b)) => a.to_bits() == b.to_bits(),
            (Key::List(a), Key::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Key::Str(s) => s.hash(state),
            Key::Int(i) => i.hash(state),
            Key::UInt(u) => u.hash(state),
            Key::Float(x) => x.to_bits().hash(state),
            Key::List(items) => items.hash(state),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(i) => write!(f, "{}", i),
            Key::UInt(u) => write!(f, "{}", u),
            Key::Float(x) => write!(f, "{}", x),
            Key::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i as i64)
    }
}

impl From<u64> for Key {
    fn from(u: u64) -> Self {
        Key::UInt(u)
    }
}

impl From<f64> for Key {
    fn from(x: f64) -> Self {
        Key::Float(x)
    }
}

pub const DEFAULT_SIP_KEY: [u8; 16] = *b"1234123456789012";

/// Keyed SipHash-2-4 over the byte encoding of a `Key`.
///
/// Strings hash their UTF-8 bytes, integers their decimal rendering.
/// Every call builds its own hasher state; nothing is shared between calls.
#[derive(Clone, Debug)]
pub struct SipKeyHasher {
    key: [u8; 16],
}

impl SipKeyHasher {
    pub fn new(key: [u8; 16]) -> Self {
        Self { key }
    }

    fn sum64(&self, data: &[u8]) -> u64 {
        let mut h = SipHasher24::new_with_key(&self.key);
        h.write(data);
        h.finish()
    }
}

impl Default for SipKeyHasher {
    fn default() -> Self {
        Self::new(DEFAULT_SIP_KEY)
    }
}

impl KeyHasher<Key> for SipKeyHasher {
    fn hash_key(&self, key: &Key) -> Result<u64, DictError> {
        match key {
            Key::Str(s) => Ok(self.sum64(s.as_bytes())),
            Key::Int(i) => Ok(self.sum64(i.to_string().as_bytes())),
            Key::UInt(u) => Ok(self.sum64(u.to_string().as_bytes())),
            Key::Float(_) | Key::List(_) => Err(DictError::UnsupportedKeyType {
                type_name: key.type_name(),
            }),
        }
    }
}
