//! Configuration for PageKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a PageKV store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the single backing file.
    /// Layout:
    ///   block 0      Meta page (root, free list head, next page id)
    ///   block i + 1  data page for logical page id i
    pub path: PathBuf,

    /// How to treat an existing / missing backing file
    pub open_mode: OpenMode,

    // -------------------------------------------------------------------------
    // Commit Configuration
    // -------------------------------------------------------------------------
    /// fsync the working copy (and its directory) before the atomic rename
    pub sync_on_commit: bool,
}

/// What `open` does depending on whether the backing file exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create a new file, fail if one already exists
    Create,

    /// Open an existing file, fail if it is missing
    Open,

    /// Open the file, creating an empty one when missing
    OpenOrCreate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./pagekv.db"),
            open_mode: OpenMode::OpenOrCreate,
            sync_on_commit: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the backing file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the open mode
    pub fn open_mode(mut self, mode: OpenMode) -> Self {
        self.config.open_mode = mode;
        self
    }

    /// Enable or disable fsync on commit
    pub fn sync_on_commit(mut self, sync: bool) -> Self {
        self.config.sync_on_commit = sync;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
