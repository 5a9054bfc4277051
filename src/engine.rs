//! Engine Module
//!
//! Application-facing store: string keys, typed values, one backing file.
//!
//! ## Responsibilities
//! - Open/create the backing file according to the config
//! - Map string keys onto tree keys and [`Entity`] values onto stored bytes
//! - Commit (`close`) or discard-and-delete (`free`) the session

use std::fs;
use std::path::Path;

use tracing::info;

use crate::btree::BTree;
use crate::config::Config;
use crate::entity::Entity;
use crate::error::{KvError, Result};
use crate::storage::DiskPageStore;
use crate::types::Key;

/// Terminator appended to string keys so they never collide with the null key
const KEY_TERMINATOR: u8 = 0x01;

/// The main store handle
///
/// ## Concurrency Model: Single Owner
///
/// - **Writes** (insert/delete) take `&mut self`
/// - **Reads** (get/contains) take `&self`
/// - Share across threads by wrapping the engine in a lock; the engine
///   itself never makes a multi-page operation atomic
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// The tree over the session's working copy
    tree: BTree<DiskPageStore>,
}

impl Engine {
    /// Open a store with the given config
    pub fn open(config: Config) -> Result<Self> {
        let store = DiskPageStore::open(&config)?;
        let tree = BTree::open(store)?;
        Ok(Self { config, tree })
    }

    /// Open or create the store at `path` with default settings
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Config::builder().path(path.as_ref()).build())
    }

    /// Delete a store file that is not currently open
    pub fn remove_storage(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(KvError::StorageNotFound(path.to_path_buf()));
        }
        fs::remove_file(path)?;
        info!(path = %path.display(), "removed storage");
        Ok(())
    }

    /// Insert or overwrite `key`
    pub fn insert(&mut self, key: &str, value: &Entity) -> Result<()> {
        let key = Self::tree_key(key)?;
        self.tree.insert(key, value.to_value()?)
    }

    /// Get the value for `key`, failing with `KeyNotFound` if absent
    pub fn get(&self, key: &str) -> Result<Entity> {
        self.try_get(key)?.ok_or(KvError::KeyNotFound)
    }

    /// Get the value for `key` if present
    pub fn try_get(&self, key: &str) -> Result<Option<Entity>> {
        let key = Self::tree_key(key)?;
        match self.tree.search(&key)? {
            Some(value) => Ok(Some(Entity::from_value(&value)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        let key = Self::tree_key(key)?;
        Ok(self.tree.search(&key)?.is_some())
    }

    /// Delete `key`; returns whether it was present
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        let key = Self::tree_key(key)?;
        self.tree.delete(&key)
    }

    /// Commit every change of this session to the backing file
    pub fn close(self) -> Result<()> {
        self.tree.into_store().close()
    }

    /// Commit, then delete the backing file
    pub fn free(self) -> Result<()> {
        self.tree.into_store().free()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn tree(&self) -> &BTree<DiskPageStore> {
        &self.tree
    }

    /// Map an application key onto a tree key: UTF-8 bytes + terminator
    fn tree_key(key: &str) -> Result<Key> {
        let mut bytes = Vec::with_capacity(key.len() + 1);
        bytes.extend_from_slice(key.as_bytes());
        bytes.push(KEY_TERMINATOR);
        Key::new(bytes)
    }
}
