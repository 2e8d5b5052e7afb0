//! Local persistence for metadata snapshots.
//!
//! This module provides:
//! - a `localStorage`-like key-value store trait with SQLite, in-memory and
//!   no-op implementations
//! - a durable cache on top of it that stamps every record with its write
//!   time and drops records older than a fixed TTL when they are read

mod durable;
mod store;

pub use durable::DurableCache;
pub use store::{LocalStore, MemoryStore, NoopStore, SqliteStore};
