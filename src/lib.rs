//! # PageKV
//!
//! An embedded, single-file, ordered key-value store with:
//! - Fixed-size pages with free-list reuse
//! - A copy-on-write B-tree (split on insert, sibling merge on delete)
//! - All-or-nothing session commit via working copy + atomic rename
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │            (string keys, typed Entity values)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ search / insert / delete
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         BTree                               │
//! │        (copy-on-write nodes, split / merge, root ptr)       │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ encode / decode                  │ get / set / delete
//!            ▼                                  ▼
//!   ┌─────────────────┐               ┌───────────────────┐
//!   │   Node Codec    │               │     PageStore     │
//!   │  (page layout)  │               │ (Meta, free list) │
//!   └─────────────────┘               └─────────┬─────────┘
//!                                               │ close: sync + rename
//!                                               ▼
//!                                     ┌───────────────────┐
//!                                     │   Backing file    │
//!                                     └───────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod types;
pub mod storage;
pub mod btree;
pub mod entity;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use btree::{BTree, TreeStats};
pub use config::{Config, OpenMode};
pub use engine::Engine;
pub use entity::Entity;
pub use error::{KvError, Result};
pub use storage::{DiskPageStore, MemoryPageStore, PageId, PageStore, PAGE_SIZE};
pub use types::{Key, Value, MAX_KEY_SIZE, MAX_VALUE_SIZE};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of PageKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
