//! Ordered keys

use std::cmp::Ordering;
use std::fmt;

use bytes::Bytes;

use crate::error::{KvError, Result};

/// Maximum key length in bytes
pub const MAX_KEY_SIZE: usize = 256;

/// An immutable key of 1..=MAX_KEY_SIZE bytes
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key(Bytes);

impl Key {
    /// Create a key, rejecting empty and oversized input
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(KvError::EmptyKey);
        }
        if bytes.len() > MAX_KEY_SIZE {
            return Err(KvError::KeyTooLarge {
                size: bytes.len(),
                max: MAX_KEY_SIZE,
            });
        }
        Ok(Self(bytes))
    }

    /// Copy a key out of a borrowed slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::new(Bytes::copy_from_slice(bytes))
    }

    /// The null key sentinel: a single zero byte
    pub fn null() -> Self {
        Self(Bytes::from_static(&[0]))
    }

    pub fn is_null(&self) -> bool {
        self.0.as_ref() == [0]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no bytes (never true for a constructed key)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        // Slice ordering is unsigned lexicographic with shorter-is-smaller.
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Key {
    type Error = KvError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::from_slice(bytes)
    }
}

impl TryFrom<Vec<u8>> for Key {
    type Error = KvError;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::new(bytes)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:02x?})", self.as_bytes())
    }
}
