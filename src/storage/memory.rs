//! In-memory page store
//!
//! Volatile store with the same allocation behavior as the disk store. Reading
//! or releasing a page that is not currently allocated is an error, which
//! makes it useful for catching stale page references.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{KvError, Result};

use super::page::MAX_PAGE_ID;
use super::{Page, PageId, PageStore};

/// Page store kept entirely in memory
#[derive(Default)]
pub struct MemoryPageStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    /// Live pages by id
    pages: HashMap<PageId, Page>,

    /// Released ids, most recently freed last
    free: Vec<PageId>,

    next_page_id: PageId,

    root: Option<PageId>,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (allocated, not freed) pages
    pub fn page_count(&self) -> usize {
        self.state.lock().pages.len()
    }

    /// Number of released pages waiting for reuse
    pub fn free_page_count(&self) -> usize {
        self.state.lock().free.len()
    }

    pub fn is_allocated(&self, id: PageId) -> bool {
        self.state.lock().pages.contains_key(&id)
    }
}

impl PageStore for MemoryPageStore {
    fn get(&self, id: PageId) -> Result<Page> {
        self.state
            .lock()
            .pages
            .get(&id)
            .cloned()
            .ok_or(KvError::PageNotAllocated(id))
    }

    fn set(&self, page: &Page) -> Result<PageId> {
        let mut state = self.state.lock();
        let id = match state.free.pop() {
            Some(id) => id,
            None => {
                let id = state.next_page_id;
                if id > MAX_PAGE_ID {
                    return Err(KvError::StorageExhausted);
                }
                state.next_page_id += 1;
                id
            }
        };
        state.pages.insert(id, page.clone());
        trace!(page_id = id, "stored page");
        Ok(id)
    }

    fn delete(&self, id: PageId) -> Result<()> {
        let mut state = self.state.lock();
        if state.pages.remove(&id).is_none() {
            return Err(KvError::PageNotAllocated(id));
        }
        state.free.push(id);
        trace!(page_id = id, "released page");
        Ok(())
    }

    fn set_root(&self, root: Option<PageId>) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(id) = root {
            if !state.pages.contains_key(&id) {
                return Err(KvError::PageNotAllocated(id));
            }
        }
        state.root = root;
        Ok(())
    }

    fn root(&self) -> Result<Option<PageId>> {
        Ok(self.state.lock().root)
    }
}
