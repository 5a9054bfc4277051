//! Key / Value Module
//!
//! Bounded, immutable byte sequences stored by the B-tree.
//!
//! ## Ordering
//! Keys compare as unsigned bytes, lexicographically; on a common prefix the
//! shorter key is smaller. The null key (a single `0x00` byte) is the
//! smallest key the tree accepts and anchors every left-boundary descent.

mod key;
mod value;

pub use key::{Key, MAX_KEY_SIZE};
pub use value::{Value, MAX_VALUE_SIZE};
