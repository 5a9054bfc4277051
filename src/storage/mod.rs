//! Storage Module
//!
//! Fixed-size page store underneath the B-tree.
//!
//! ## Responsibilities
//! - Map logical page ids to fixed-size blocks
//! - Allocate ids, reusing freed pages through an intrusive free list
//! - Persist the tree's root pointer in the Meta page
//! - Commit a whole session atomically (disk store only)
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Block 0: Meta (zero-padded)            │
//! │ ┌──────────┬──────────────┬──────────┐ │
//! │ │ Root (4) │ FreeHead (4) │ Next (4) │ │
//! │ └──────────┴──────────────┴──────────┘ │
//! ├────────────────────────────────────────┤
//! │ Block i + 1: logical page i            │
//! │   B-tree node encoding, or             │
//! │   free list entry: NextFree (4)        │
//! └────────────────────────────────────────┘
//! ```
//! All integers are big-endian `i32`; `-1` marks an undefined reference.

mod disk;
mod memory;
mod page;

pub use disk::DiskPageStore;
pub use memory::MemoryPageStore;
pub use page::{FreeListEntry, Meta, Page, PageId, PAGE_SIZE, UNDEFINED_REF};

use crate::error::Result;

/// Block storage addressed by page id.
///
/// Every method is one physical operation; implementations serialize them
/// internally, but nothing makes a sequence of calls atomic.
pub trait PageStore {
    /// Read the block stored under `id`
    fn get(&self, id: PageId) -> Result<Page>;

    /// Store a block under a fresh or recycled id and return that id
    fn set(&self, page: &Page) -> Result<PageId>;

    /// Release `id` to the free list
    fn delete(&self, id: PageId) -> Result<()>;

    /// Persist the tree root (`None` for an empty tree)
    fn set_root(&self, root: Option<PageId>) -> Result<()>;

    /// Read the persisted tree root
    fn root(&self) -> Result<Option<PageId>>;
}

impl<S: PageStore + ?Sized> PageStore for &S {
    fn get(&self, id: PageId) -> Result<Page> {
        (**self).get(id)
    }

    fn set(&self, page: &Page) -> Result<PageId> {
        (**self).set(page)
    }

    fn delete(&self, id: PageId) -> Result<()> {
        (**self).delete(id)
    }

    fn set_root(&self, root: Option<PageId>) -> Result<()> {
        (**self).set_root(root)
    }

    fn root(&self) -> Result<Option<PageId>> {
        (**self).root()
    }
}
