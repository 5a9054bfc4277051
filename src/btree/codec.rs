//! Node codec
//!
//! ## Page Layout
//! ```text
//! ┌──────────┬───────────┬───────────────────────────┐
//! │ Leaf (1) │ Count (2) │ [KeyLen (2)][Key] × Count │
//! ├──────────┴───────────┴───────────────────────────┤
//! │ Leaf:     [ValLen (2)][Value] × Count            │
//! │ Internal: [Child (4)] × Count                    │
//! └──────────────────────────────────────────────────┘
//! ```
//! Integers are big-endian; the rest of the page is zero.

use bytes::{Buf, BufMut};

use crate::error::{KvError, Result};
use crate::storage::{Page, PageId, PAGE_SIZE};
use crate::types::{Key, Value};

use super::node::{Node, NodeBody};

/// Leaf flag (1) + key count (2)
pub const NODE_HEADER_SIZE: usize = 3;

/// Length prefix in front of every key and value
pub const LEN_PREFIX_SIZE: usize = 2;

/// Child reference in an internal node
pub const CHILD_REF_SIZE: usize = 4;

const LEAF_FLAG: u8 = 1;
const INTERNAL_FLAG: u8 = 0;

/// Encode a node into one page. Oversize nodes must be split first.
pub fn encode(node: &Node) -> Result<Page> {
    let size = node.encoded_size();
    if size > PAGE_SIZE {
        return Err(KvError::NodeTooLarge {
            size,
            max: PAGE_SIZE,
        });
    }

    let mut page = Page::zeroed();
    let mut buf = page.as_bytes_mut();

    buf.put_u8(if node.is_leaf() { LEAF_FLAG } else { INTERNAL_FLAG });
    buf.put_u16(node.len() as u16);
    for key in node.keys() {
        buf.put_u16(key.len() as u16);
        buf.put_slice(key.as_bytes());
    }
    match node.body() {
        NodeBody::Leaf(values) => {
            for value in values {
                buf.put_u16(value.len() as u16);
                buf.put_slice(value.as_bytes());
            }
        }
        NodeBody::Internal(children) => {
            for &child in children {
                buf.put_i32(child as i32);
            }
        }
    }

    Ok(page)
}

/// Decode a page written by [`encode`]
///
/// Only declared lengths are checked; key order is not validated here.
pub fn decode(page: &Page) -> Result<Node> {
    let mut buf = page.as_bytes();

    let is_leaf = match buf.get_u8() {
        LEAF_FLAG => true,
        INTERNAL_FLAG => false,
        other => {
            return Err(KvError::CorruptPage(format!("unknown node flag {}", other)));
        }
    };
    let count = buf.get_u16() as usize;

    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        let bytes = take_prefixed(&mut buf)?;
        keys.push(Key::from_slice(bytes).map_err(|e| KvError::CorruptPage(e.to_string()))?);
    }

    let body = if is_leaf {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let bytes = take_prefixed(&mut buf)?;
            values.push(Value::from_slice(bytes).map_err(|e| KvError::CorruptPage(e.to_string()))?);
        }
        NodeBody::Leaf(values)
    } else {
        if buf.remaining() < count * CHILD_REF_SIZE {
            return Err(truncated());
        }
        let mut children = Vec::with_capacity(count);
        for _ in 0..count {
            let raw = buf.get_i32();
            if raw < 0 {
                return Err(KvError::CorruptPage(format!("negative child reference {}", raw)));
            }
            children.push(raw as PageId);
        }
        NodeBody::Internal(children)
    };

    Ok(Node { keys, body })
}

/// Read a `[len: u16][bytes]` field
fn take_prefixed<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8]> {
    if buf.remaining() < LEN_PREFIX_SIZE {
        return Err(truncated());
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(truncated());
    }
    let slice: &'a [u8] = *buf;
    let (bytes, rest) = slice.split_at(len);
    *buf = rest;
    Ok(bytes)
}

fn truncated() -> KvError {
    KvError::CorruptPage("node encoding runs past the end of the page".to_string())
}
