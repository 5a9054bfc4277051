//! Page buffers and the fixed page layouts owned by the store
//!
//! The Meta page and free list entries are tiny fixed records at the start of
//! an otherwise zeroed block.

use bytes::{Buf, BufMut};

use crate::error::{KvError, Result};

/// Size of every block in the backing file
pub const PAGE_SIZE: usize = 4096;

/// On-disk encoding of an absent page reference
pub const UNDEFINED_REF: i32 = -1;

/// Logical page id (data page `i` lives in block `i + 1`)
pub type PageId = u32;

/// Largest id that can be allocated; anything above would not fit an `i32` ref
pub(crate) const MAX_PAGE_ID: PageId = (i32::MAX - 1) as PageId;

// =============================================================================
// Page
// =============================================================================

/// One zero-initialized block of PAGE_SIZE bytes
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    pub fn zeroed() -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    /// Build a page from at most PAGE_SIZE bytes, zero-padding the rest
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > PAGE_SIZE {
            return Err(KvError::NodeTooLarge {
                size: bytes.len(),
                max: PAGE_SIZE,
            });
        }
        let mut page = Self::zeroed();
        page.data[..bytes.len()].copy_from_slice(bytes);
        Ok(page)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Page({:02x?}..)", &self.data[..16])
    }
}

// =============================================================================
// Reference helpers
// =============================================================================

pub(crate) fn encode_ref(id: Option<PageId>) -> i32 {
    match id {
        Some(id) => id as i32,
        None => UNDEFINED_REF,
    }
}

pub(crate) fn decode_ref(raw: i32) -> Result<Option<PageId>> {
    match raw {
        UNDEFINED_REF => Ok(None),
        id if id >= 0 => Ok(Some(id as PageId)),
        other => Err(KvError::CorruptPage(format!("invalid page reference {}", other))),
    }
}

// =============================================================================
// Meta
// =============================================================================

/// Contents of block 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meta {
    /// Root of the B-tree, `None` for an empty tree
    pub root: Option<PageId>,

    /// Head of the free list
    pub free_list: Option<PageId>,

    /// Next never-used page id
    pub next_page_id: PageId,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            root: None,
            free_list: None,
            next_page_id: 0,
        }
    }
}

impl Meta {
    /// Encoded as `[root: i32][free_list: i32][next_page_id: i32]`, zero-padded
    pub fn encode(&self) -> Page {
        let mut page = Page::zeroed();
        let mut buf = page.as_bytes_mut();
        buf.put_i32(encode_ref(self.root));
        buf.put_i32(encode_ref(self.free_list));
        buf.put_i32(self.next_page_id as i32);
        page
    }

    pub fn decode(page: &Page) -> Result<Self> {
        let mut buf = page.as_bytes();
        let root = decode_ref(buf.get_i32())?;
        let free_list = decode_ref(buf.get_i32())?;
        let next = buf.get_i32();
        if next < 0 {
            return Err(KvError::CorruptPage(format!(
                "meta page has negative next page id {}",
                next
            )));
        }
        let meta = Self {
            root,
            free_list,
            next_page_id: next as PageId,
        };

        for id in [meta.root, meta.free_list].into_iter().flatten() {
            if id >= meta.next_page_id {
                return Err(KvError::CorruptPage(format!(
                    "meta page references page {} beyond next page id {}",
                    id, meta.next_page_id
                )));
            }
        }
        Ok(meta)
    }
}

// =============================================================================
// Free list entry
// =============================================================================

/// A released page reinterpreted as a link in the free list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeListEntry {
    pub next: Option<PageId>,
}

impl FreeListEntry {
    pub fn encode(&self) -> Page {
        let mut page = Page::zeroed();
        let mut buf = page.as_bytes_mut();
        buf.put_i32(encode_ref(self.next));
        page
    }

    pub fn decode(page: &Page) -> Result<Self> {
        let mut buf = page.as_bytes();
        Ok(Self {
            next: decode_ref(buf.get_i32())?,
        })
    }
}
