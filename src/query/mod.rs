//! Response cache for remote data.
//!
//! Inspired by TanStack Query, this module keeps one process-wide cache of
//! JSON responses addressed by structural keys:
//! - fresh entries are served without touching the network
//! - stale entries are refetched on the next read (or eagerly, on request)
//! - at most one fetch per key is in flight; concurrent callers share it
//! - entries nobody reads are evicted after their eviction window

mod client;
mod key;

pub use client::{EntryStatus, InvalidateOptions, PrefetchOutcome, QueryClient, QueryOptions};
pub use key::QueryKey;
