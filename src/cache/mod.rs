//! Named cache partitions holding request → response entries.
//!
//! This module mirrors the browser CacheStorage model:
//! - Partitions are opened (created) by name and deleted as a whole
//! - Each entry is keyed by request URL (fragment removed, query kept)
//! - Matching across all partitions searches them in creation order
//!
//! Entries never expire; a partition disappears only when activation
//! deletes a name outside the current whitelist.

mod storage;

pub use storage::{CacheStorage, CachedResponse, SqliteStorage};
