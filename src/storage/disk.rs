//! Disk Page Store
//!
//! Single-file page store with whole-session commit.
//!
//! ## Commit protocol
//! 1. `open` copies the backing file into a private working copy in the same
//!    directory; every page operation of the session goes to that copy.
//! 2. `close` writes the Meta page, syncs the copy and atomically renames it
//!    over the original.
//! 3. Dropping the store without `close` deletes the working copy, leaving the
//!    original file exactly as it was when the session started.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, trace, warn};

use crate::config::{Config, OpenMode};
use crate::error::{KvError, Result};

use super::page::MAX_PAGE_ID;
use super::{FreeListEntry, Meta, Page, PageId, PageStore, PAGE_SIZE};

/// Page store backed by a single file
///
/// ## Concurrency:
/// - `session`: Mutex around the working copy and cached Meta, so each
///   physical page operation runs alone
/// - Multi-page operations are NOT isolated; callers serialize them
pub struct DiskPageStore {
    /// Backing file replaced on commit
    path: PathBuf,

    /// fsync before rename
    sync_on_commit: bool,

    /// Open session, `None` once closed
    session: Mutex<Option<Session>>,
}

/// Working state of one open session
struct Session {
    /// Private copy of the backing file receiving all writes
    working: NamedTempFile,

    /// Cached Meta page, written through on every change
    meta: Meta,

    /// Ids currently on the free list
    free: HashSet<PageId>,
}

impl DiskPageStore {
    /// Open a store according to `config.open_mode`
    ///
    /// On open:
    /// 1. Check / create the backing file
    /// 2. Copy it into a working file next to it
    /// 3. Initialize the Meta page if the file is empty, else load it
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.path.clone();
        let exists = path.exists();

        match (config.open_mode, exists) {
            (OpenMode::Create, true) => return Err(KvError::StorageExists(path)),
            (OpenMode::Open, false) => return Err(KvError::StorageNotFound(path)),
            (OpenMode::Create, false) | (OpenMode::OpenOrCreate, false) => {
                OpenOptions::new().write(true).create_new(true).open(&path)?;
                debug!(path = %path.display(), "created empty backing file");
            }
            _ => {}
        }

        let mut working = tempfile::Builder::new()
            .prefix(".pagekv-")
            .suffix(".tmp")
            .tempfile_in(Self::parent_dir(&path))?;

        let mut original = File::open(&path)?;
        let copied = io::copy(&mut original, working.as_file_mut())?;

        let meta = if copied < PAGE_SIZE as u64 {
            let meta = Meta::default();
            write_block(working.as_file_mut(), 0, &meta.encode())?;
            meta
        } else {
            let meta = Meta::decode(&read_block(working.as_file_mut(), 0)?)?;
            let required = (meta.next_page_id as u64 + 1) * PAGE_SIZE as u64;
            if copied < required {
                return Err(KvError::CorruptPage(format!(
                    "file holds {} bytes but meta requires {}",
                    copied, required
                )));
            }
            meta
        };

        let mut session = Session {
            working,
            meta,
            free: HashSet::new(),
        };
        session.load_free_list()?;

        info!(
            path = %path.display(),
            root = ?meta.root,
            next_page_id = meta.next_page_id,
            free_pages = session.free.len(),
            "opened page store"
        );

        Ok(Self {
            path,
            sync_on_commit: config.sync_on_commit,
            session: Mutex::new(Some(session)),
        })
    }

    /// Open (or create) the store at `path` with default settings
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder().path(path.as_ref()).build();
        Self::open(&config)
    }

    /// Commit the session: sync the working copy and rename it over the original
    ///
    /// The store is closed afterwards, even if the commit fails; on failure
    /// the original file is left untouched.
    pub fn close(&self) -> Result<()> {
        let session = self.session.lock().take().ok_or(KvError::Closed)?;
        self.commit(session)
    }

    /// Commit if still open, then delete the backing file
    pub fn free(&self) -> Result<()> {
        let session = self.session.lock().take();
        if let Some(session) = session {
            self.commit(session)?;
        }
        fs::remove_file(&self.path)?;
        info!(path = %self.path.display(), "freed page store");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.session.lock().is_none()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the Meta page
    pub fn meta(&self) -> Result<Meta> {
        let guard = self.session.lock();
        let session = guard.as_ref().ok_or(KvError::Closed)?;
        Ok(session.meta)
    }

    /// Number of pages ever allocated (live + free)
    pub fn page_count(&self) -> Result<u32> {
        Ok(self.meta()?.next_page_id)
    }

    /// Length of the free list
    pub fn free_page_count(&self) -> Result<u32> {
        let guard = self.session.lock();
        let session = guard.as_ref().ok_or(KvError::Closed)?;
        Ok(session.free.len() as u32)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn commit(&self, mut session: Session) -> Result<()> {
        let meta = session.meta;
        let file = session.working.as_file_mut();
        write_block(file, 0, &meta.encode())?;
        file.flush()?;
        if self.sync_on_commit {
            file.sync_all()?;
        }

        session.working.persist(&self.path).map_err(|e| e.error)?;

        if self.sync_on_commit {
            sync_dir(Self::parent_dir(&self.path))?;
        }

        info!(
            path = %self.path.display(),
            root = ?meta.root,
            next_page_id = meta.next_page_id,
            "committed page store"
        );
        Ok(())
    }

    fn parent_dir(path: &Path) -> &Path {
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

impl PageStore for DiskPageStore {
    fn get(&self, id: PageId) -> Result<Page> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(KvError::Closed)?;
        session.check_allocated(id)?;
        session.read_page(id)
    }

    fn set(&self, page: &Page) -> Result<PageId> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(KvError::Closed)?;

        let id = match session.meta.free_list {
            Some(head) => {
                let entry = FreeListEntry::decode(&session.read_page(head)?)?;
                session.meta.free_list = entry.next;
                session.free.remove(&head);
                trace!(page_id = head, "reusing free page");
                head
            }
            None => {
                let id = session.meta.next_page_id;
                if id > MAX_PAGE_ID {
                    return Err(KvError::StorageExhausted);
                }
                session.meta.next_page_id += 1;
                trace!(page_id = id, "allocating new page");
                id
            }
        };

        write_block(session.working.as_file_mut(), id as u64 + 1, page)?;
        session.write_meta()?;
        Ok(id)
    }

    fn delete(&self, id: PageId) -> Result<()> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(KvError::Closed)?;
        session.check_allocated(id)?;

        let entry = FreeListEntry {
            next: session.meta.free_list,
        };
        write_block(session.working.as_file_mut(), id as u64 + 1, &entry.encode())?;
        session.meta.free_list = Some(id);
        session.free.insert(id);
        session.write_meta()?;
        trace!(page_id = id, "released page");
        Ok(())
    }

    fn set_root(&self, root: Option<PageId>) -> Result<()> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(KvError::Closed)?;
        if let Some(id) = root {
            session.check_allocated(id)?;
        }
        session.meta.root = root;
        session.write_meta()?;
        debug!(root = ?root, "root updated");
        Ok(())
    }

    fn root(&self) -> Result<Option<PageId>> {
        Ok(self.meta()?.root)
    }
}

impl Drop for DiskPageStore {
    fn drop(&mut self) {
        if self.session.get_mut().is_some() {
            warn!(
                path = %self.path.display(),
                "page store dropped without close; session changes discarded"
            );
        }
    }
}

impl Session {
    fn check_bounds(&self, id: PageId) -> Result<()> {
        if id >= self.meta.next_page_id {
            return Err(KvError::PageOutOfBounds {
                page_id: id,
                next_page_id: self.meta.next_page_id,
            });
        }
        Ok(())
    }

    /// In bounds and not on the free list
    fn check_allocated(&self, id: PageId) -> Result<()> {
        self.check_bounds(id)?;
        if self.free.contains(&id) {
            return Err(KvError::PageNotAllocated(id));
        }
        Ok(())
    }

    /// Walk the free list from the Meta head, rejecting cycles
    fn load_free_list(&mut self) -> Result<()> {
        let mut cursor = self.meta.free_list;
        while let Some(id) = cursor {
            if !self.free.insert(id) {
                return Err(KvError::CorruptPage(format!(
                    "free list revisits page {}",
                    id
                )));
            }
            cursor = FreeListEntry::decode(&self.read_page(id)?)?.next;
        }
        Ok(())
    }

    fn read_page(&mut self, id: PageId) -> Result<Page> {
        self.check_bounds(id)?;
        read_block(self.working.as_file_mut(), id as u64 + 1)
    }

    fn write_meta(&mut self) -> Result<()> {
        let page = self.meta.encode();
        write_block(self.working.as_file_mut(), 0, &page)
    }
}

// =============================================================================
// Block I/O
// =============================================================================

fn read_block(file: &mut File, block: u64) -> Result<Page> {
    let mut page = Page::zeroed();
    file.seek(SeekFrom::Start(block * PAGE_SIZE as u64))?;
    file.read_exact(page.as_bytes_mut())?;
    Ok(page)
}

fn write_block(file: &mut File, block: u64, page: &Page) -> Result<()> {
    file.seek(SeekFrom::Start(block * PAGE_SIZE as u64))?;
    file.write_all(page.as_bytes())?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
