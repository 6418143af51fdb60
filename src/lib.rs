//! Strata - a disk-oriented storage engine core in Rust
//!
//! This crate implements the storage heart of an educational database: a
//! fixed-size buffer pool that mediates access to a paged disk file, and a
//! B+Tree index whose nodes live inside buffer-pool frames.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): disk I/O and well-known pages
//!   - `DiskManager`: reads and writes fixed-size pages in a database file
//!   - `DiskScheduler`: background worker draining a disk request queue
//!   - `HeaderPage`: page 0, mapping index names to root page ids
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: fetches pages into frames and pins them
//!   - `LruReplacer`: least-recently-unpinned eviction order
//!   - `Frame`: one page of data plus pin count and dirty flag
//!
//! - **Index** (`index`): ordered access by key
//!   - `BPlusTree`: search, insert with splits, delete with
//!     redistribute/coalesce, root persistence
//!   - `BTreeIterator`: forward scan over the leaf chain
//!   - `KeyComparator`: injected ordering over fixed-width key blobs
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata::buffer::BufferPoolManager;
//! use strata::common::{RecordId, PageId, SlotId, Transaction};
//! use strata::index::{encode_integer_key, BPlusTree, IntegerComparator};
//! use strata::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(100, disk_manager));
//!
//! let mut tree = BPlusTree::new("primary", bpm, Arc::new(IntegerComparator), 8, 32, 32);
//! let txn = Transaction::default();
//!
//! let mut key = [0u8; 8];
//! encode_integer_key(42, &mut key);
//! tree.insert(&key, RecordId::new(PageId::new(7), SlotId::new(0)), &txn)
//!     .unwrap();
//! assert!(tree.get_value(&key, &txn).unwrap().is_some());
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{PageId, RecordId, Result, SlotId, StrataError, Transaction};
