//! TTL-bounded cache over a [`LocalStore`].

use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::store::LocalStore;
use crate::clock::SharedClock;
use crate::query::QueryKey;

/// Namespace for records written by [`DurableCache::write_query`].
const QUERY_KEY_PREFIX: &str = "limelight:query:";

/// Stored form of one record.
#[derive(Debug, Serialize, Deserialize)]
struct DurableRecord<T> {
  value: T,
  /// Write time in epoch milliseconds
  timestamp: i64,
}

/// Locally persisted cache with a fixed time-to-live.
///
/// Expired records are deleted when read. Storage and decoding problems are
/// logged and read as misses; nothing here returns an error to the caller.
pub struct DurableCache {
  store: Arc<dyn LocalStore>,
  clock: SharedClock,
  ttl: Duration,
}

impl DurableCache {
  pub fn new(store: Arc<dyn LocalStore>, clock: SharedClock) -> Self {
    Self {
      store,
      clock,
      ttl: Duration::minutes(5),
    }
  }

  /// Set the time-to-live for records.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  /// Read a record, or `None` if it is missing, expired, or unreadable.
  pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    match self.try_read(key) {
      Ok(value) => value,
      Err(e) => {
        warn!(key, error = %e, "durable cache read failed");
        None
      }
    }
  }

  /// Store `value` stamped with the current time.
  pub fn write<T: Serialize>(&self, key: &str, value: &T) {
    if let Err(e) = self.try_write(key, value) {
      warn!(key, error = %e, "durable cache write failed");
    }
  }

  /// Delete a record unconditionally.
  pub fn invalidate(&self, key: &str) {
    if let Err(e) = self.store.remove_item(key) {
      warn!(key, error = %e, "durable cache invalidate failed");
    }
  }

  pub fn read_query<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
    self.read(&Self::storage_key(key))
  }

  pub fn write_query<T: Serialize>(&self, key: &QueryKey, value: &T) {
    self.write(&Self::storage_key(key), value)
  }

  pub fn invalidate_query(&self, key: &QueryKey) {
    self.invalidate(&Self::storage_key(key))
  }

  /// Storage key for a query key.
  pub fn storage_key(key: &QueryKey) -> String {
    format!("{}{}", QUERY_KEY_PREFIX, key.cache_hash())
  }

  fn try_read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    let Some(raw) = self.store.get_item(key)? else {
      return Ok(None);
    };

    let record: DurableRecord<T> = match serde_json::from_str(&raw) {
      Ok(record) => record,
      Err(e) => {
        // Corrupt records read as misses
        debug!(key, error = %e, "discarding unreadable durable record");
        return Ok(None);
      }
    };

    let age = self.clock.now().timestamp_millis() - record.timestamp;
    if age >= self.ttl.num_milliseconds() {
      debug!(key, age_ms = age, "durable record expired");
      self.store.remove_item(key)?;
      return Ok(None);
    }

    Ok(Some(record.value))
  }

  fn try_write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
    let record = DurableRecord {
      value,
      timestamp: self.clock.now().timestamp_millis(),
    };
    let raw = serde_json::to_string(&record)
      .map_err(|e| eyre!("Failed to serialize record {}: {}", key, e))?;
    self.store.set_item(key, &raw)
  }
}
