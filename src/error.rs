//! Error types for PageKV
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::PageId;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for PageKV operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Size Limit Errors
    // -------------------------------------------------------------------------
    #[error("Key too large: {size} bytes (max {max})")]
    KeyTooLarge { size: usize, max: usize },

    #[error("Key must not be empty")]
    EmptyKey,

    #[error("Value too large: {size} bytes (max {max})")]
    ValueTooLarge { size: usize, max: usize },

    #[error("Node too large: {size} bytes encoded (page size {max})")]
    NodeTooLarge { size: usize, max: usize },

    #[error("Node with {keys} key(s) cannot be split")]
    NodeUnsplittable { keys: usize },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Page {page_id} out of bounds (next page id {next_page_id})")]
    PageOutOfBounds { page_id: PageId, next_page_id: PageId },

    #[error("Page {0} is not allocated")]
    PageNotAllocated(PageId),

    #[error("Corrupt page: {0}")]
    CorruptPage(String),

    #[error("Storage exhausted: no page ids left")]
    StorageExhausted,

    // -------------------------------------------------------------------------
    // Logical Misuse
    // -------------------------------------------------------------------------
    #[error("Page store is closed")]
    Closed,

    #[error("Expected {expected} node, found {found} node")]
    WrongNodeKind {
        expected: &'static str,
        found: &'static str,
    },

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Storage already exists: {0}")]
    StorageExists(PathBuf),

    #[error("Storage not found: {0}")]
    StorageNotFound(PathBuf),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl KvError {
    /// Whether this error is a rejected size limit rather than a storage failure.
    ///
    /// Size-limit errors leave the store untouched and the caller may retry with
    /// smaller input.
    pub fn is_size_limit(&self) -> bool {
        matches!(
            self,
            KvError::KeyTooLarge { .. }
                | KvError::EmptyKey
                | KvError::ValueTooLarge { .. }
                | KvError::NodeTooLarge { .. }
                | KvError::NodeUnsplittable { .. }
        )
    }
}

impl From<bincode::Error> for KvError {
    fn from(e: bincode::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}
