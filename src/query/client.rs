//! Process-wide response cache.
//!
//! Modeled after TanStack Query's `QueryClient`: every entry is addressed by a
//! structural [`QueryKey`], carries a staleness window (how long the data is
//! served without refetching) and a garbage-collection window (how long an
//! entry survives without being accessed), and at most one fetch per key is in
//! flight at a time.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use super::key::QueryKey;
use crate::clock::SharedClock;

/// Result handed to every waiter of a single fetch.
///
/// Errors are flattened to strings so the result can be cloned to all waiters.
type FetchResult = Result<Value, String>;

/// A factory that creates futures for fetching a query's data.
type FetcherFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

type InFlight = Shared<BoxFuture<'static, FetchResult>>;

/// Staleness and eviction windows for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
  /// How long fetched data is considered fresh.
  pub stale_time: Duration,
  /// How long an entry survives without being accessed.
  pub gc_time: Duration,
}

impl QueryOptions {
  pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
    Self {
      stale_time,
      gc_time,
    }
  }
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      stale_time: Duration::minutes(5),
      gc_time: Duration::minutes(10),
    }
  }
}

/// Which queries to refetch after an invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefetchType {
  /// Only mark stale; the next read refetches.
  #[default]
  None,
  /// Mark stale and refetch in the background right away.
  Active,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InvalidateOptions {
  pub refetch: RefetchType,
}

impl InvalidateOptions {
  /// Mark stale without fetching.
  pub fn lazy() -> Self {
    Self {
      refetch: RefetchType::None,
    }
  }

  pub fn eager() -> Self {
    Self {
      refetch: RefetchType::Active,
    }
  }
}

/// What a background prefetch ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefetchOutcome {
  /// A fresh entry already existed; nothing was fetched.
  Fresh,
  /// The caller found data already cached and skipped the prefetch.
  Cached,
  /// This call started a fetch and it succeeded.
  Fetched,
  /// This call joined a fetch that was already in flight, which succeeded.
  Joined,
  /// The fetch failed. The error has already been logged.
  Failed(String),
}

impl PrefetchOutcome {
  pub fn is_failure(&self) -> bool {
    matches!(self, PrefetchOutcome::Failed(_))
  }
}

/// Summary of one entry, for status reporting.
#[derive(Debug, Clone)]
pub struct EntryStatus {
  pub key: QueryKey,
  pub updated_at: DateTime<Utc>,
  pub is_stale: bool,
  pub is_fetching: bool,
}

struct QueryEntry {
  data: Value,
  updated_at: DateTime<Utc>,
  last_accessed: DateTime<Utc>,
  options: QueryOptions,
  invalidated: bool,
  /// Kept so an eager invalidation can refetch without the caller
  fetcher: Option<FetcherFn>,
}

impl QueryEntry {
  fn is_stale(&self, now: DateTime<Utc>) -> bool {
    self.invalidated || now - self.updated_at >= self.options.stale_time
  }

  fn is_expired(&self, now: DateTime<Utc>) -> bool {
    now - self.last_accessed >= self.options.gc_time
  }
}

#[derive(Default)]
struct Inner {
  entries: HashMap<QueryKey, QueryEntry>,
  in_flight: HashMap<QueryKey, InFlight>,
}

impl Inner {
  /// Look up an entry, dropping it first if its eviction window has passed.
  fn live_entry(&mut self, key: &QueryKey, now: DateTime<Utc>) -> Option<&mut QueryEntry> {
    if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
      debug!(%key, "evicting expired query entry");
      self.entries.remove(key);
      return None;
    }

    let entry = self.entries.get_mut(key)?;
    entry.last_accessed = now;
    Some(entry)
  }
}

/// Shared response cache. Cloning is cheap and every clone sees the same entries.
#[derive(Clone)]
pub struct QueryClient {
  inner: Arc<Mutex<Inner>>,
  clock: SharedClock,
  defaults: QueryOptions,
}

impl QueryClient {
  pub fn new(clock: SharedClock) -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner::default())),
      clock,
      defaults: QueryOptions::default(),
    }
  }

  /// Set the options used by [`QueryClient::fetch_query`] callers that pass `None`.
  pub fn with_defaults(mut self, defaults: QueryOptions) -> Self {
    self.defaults = defaults;
    self
  }

  pub fn defaults(&self) -> QueryOptions {
    self.defaults
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Cached data for `key`, fresh or stale. Never fetches.
  pub fn get(&self, key: &QueryKey) -> Option<Value> {
    let now = self.clock.now();
    let mut inner = self.lock();
    inner.live_entry(key, now).map(|e| e.data.clone())
  }

  /// Whether `key` has a fresh entry.
  #[cfg(test)]
  pub fn is_fresh(&self, key: &QueryKey) -> bool {
    let now = self.clock.now();
    let mut inner = self.lock();
    inner
      .live_entry(key, now)
      .is_some_and(|e| !e.is_stale(now))
  }

  #[cfg(test)]
  pub fn is_fetching(&self, key: &QueryKey) -> bool {
    self.lock().in_flight.contains_key(key)
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Install data directly, as if it had just been fetched.
  pub fn set_query_data(&self, key: &QueryKey, data: Value, options: QueryOptions) {
    let now = self.clock.now();
    let mut inner = self.lock();
    let fetcher = inner.entries.get(key).and_then(|e| e.fetcher.clone());
    inner.entries.insert(
      key.clone(),
      QueryEntry {
        data,
        updated_at: now,
        last_accessed: now,
        options,
        invalidated: false,
        fetcher,
      },
    );
  }

  /// Fetch `key` into the cache unless a fresh entry already exists.
  ///
  /// Joins a fetch already in flight for the same key instead of starting a
  /// second one. Failures are logged and reported through the outcome; this
  /// never returns an error.
  pub async fn prefetch<F, Fut>(
    &self,
    key: &QueryKey,
    fetcher: F,
    options: QueryOptions,
  ) -> PrefetchOutcome
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
  {
    let now = self.clock.now();
    let (running, joined) = {
      let mut inner = self.lock();
      if inner.live_entry(key, now).is_some_and(|e| !e.is_stale(now)) {
        return PrefetchOutcome::Fresh;
      }
      self.start_or_join(&mut inner, key, box_fetcher(fetcher), options)
    };

    match running.await {
      Ok(_) if joined => PrefetchOutcome::Joined,
      Ok(_) => PrefetchOutcome::Fetched,
      Err(e) => {
        warn!(%key, error = %e, "prefetch failed");
        PrefetchOutcome::Failed(e)
      }
    }
  }

  /// Read-through fetch for foreground readers.
  ///
  /// 1. Fresh entry: return it.
  /// 2. Stale or missing: fetch (or join the fetch in flight).
  /// 3. Fetch failed but stale data exists: serve the stale data.
  /// 4. Fetch failed with nothing cached: return the error.
  pub async fn fetch_query<F, Fut>(
    &self,
    key: &QueryKey,
    fetcher: F,
    options: Option<QueryOptions>,
  ) -> Result<Value>
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
  {
    let options = options.unwrap_or(self.defaults);
    let now = self.clock.now();
    let (running, stale) = {
      let mut inner = self.lock();
      let stale = match inner.live_entry(key, now) {
        Some(entry) if !entry.is_stale(now) => return Ok(entry.data.clone()),
        Some(entry) => Some(entry.data.clone()),
        None => None,
      };
      let (running, _) = self.start_or_join(&mut inner, key, box_fetcher(fetcher), options);
      (running, stale)
    };

    match (running.await, stale) {
      (Ok(data), _) => Ok(data),
      (Err(e), Some(stale)) => {
        warn!(%key, error = %e, "refetch failed, serving stale data");
        Ok(stale)
      }
      (Err(e), None) => Err(eyre!("Failed to fetch {}: {}", key, e)),
    }
  }

  /// Typed variant of [`QueryClient::fetch_query`].
  pub async fn fetch_query_as<T, F, Fut>(
    &self,
    key: &QueryKey,
    fetcher: F,
    options: Option<QueryOptions>,
  ) -> Result<T>
  where
    T: DeserializeOwned,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
  {
    let data = self.fetch_query(key, fetcher, options).await?;
    serde_json::from_value(data).map_err(|e| eyre!("Failed to decode {}: {}", key, e))
  }

  /// Mark the entry for `key` stale.
  ///
  /// Marking an already stale entry again has no further effect. With
  /// [`RefetchType::Active`] the entry's last fetcher is re-run in the
  /// background. Returns whether an entry existed.
  pub fn invalidate_stale(&self, key: &QueryKey, options: InvalidateOptions) -> bool {
    let mut inner = self.lock();
    self.invalidate_locked(&mut inner, key, options)
  }

  /// Invalidate every entry whose key starts with `prefix`. Returns how many matched.
  pub fn invalidate_matching(&self, prefix: &QueryKey, options: InvalidateOptions) -> usize {
    let mut inner = self.lock();
    let keys: Vec<QueryKey> = inner
      .entries
      .keys()
      .filter(|k| prefix.is_prefix_of(k))
      .cloned()
      .collect();

    for key in &keys {
      self.invalidate_locked(&mut inner, key, options);
    }
    keys.len()
  }

  /// Drop every entry. Returns how many were dropped.
  pub fn clear(&self) -> usize {
    let mut inner = self.lock();
    let dropped = inner.entries.len();
    inner.entries.clear();
    dropped
  }

  /// Drop every entry whose eviction window has passed. Returns how many were dropped.
  pub fn collect_garbage(&self) -> usize {
    let now = self.clock.now();
    let mut inner = self.lock();
    let before = inner.entries.len();
    inner.entries.retain(|_, e| !e.is_expired(now));
    before - inner.entries.len()
  }

  /// Status of every entry, ordered by key.
  pub fn entries(&self) -> Vec<EntryStatus> {
    let now = self.clock.now();
    let inner = self.lock();
    let mut statuses: Vec<EntryStatus> = inner
      .entries
      .iter()
      .map(|(key, entry)| EntryStatus {
        key: key.clone(),
        updated_at: entry.updated_at,
        is_stale: entry.is_stale(now),
        is_fetching: inner.in_flight.contains_key(key),
      })
      .collect();
    statuses.sort_by(|a, b| a.key.cmp(&b.key));
    statuses
  }

  fn invalidate_locked(&self, inner: &mut Inner, key: &QueryKey, options: InvalidateOptions) -> bool {
    let Some(entry) = inner.entries.get_mut(key) else {
      return false;
    };
    entry.invalidated = true;

    if options.refetch == RefetchType::Active {
      if let Some(fetcher) = entry.fetcher.clone() {
        let query_options = entry.options;
        self.start_or_join(inner, key, fetcher, query_options);
      }
    }
    true
  }

  /// Return the fetch in flight for `key`, starting one if there is none.
  ///
  /// The fetch runs as its own task so it finishes and installs its result
  /// even when every waiter stops waiting. The boolean is true when an
  /// existing fetch was joined.
  fn start_or_join(
    &self,
    inner: &mut Inner,
    key: &QueryKey,
    fetcher: FetcherFn,
    options: QueryOptions,
  ) -> (InFlight, bool) {
    if let Some(running) = inner.in_flight.get(key) {
      return (running.clone(), true);
    }

    debug!(%key, "starting query fetch");
    let mut guard = InFlightGuard {
      client: self.clone(),
      key: key.clone(),
      armed: true,
    };
    let task = tokio::spawn(async move {
      let result = fetcher().await.map_err(|e| format!("{:#}", e));
      guard.armed = false;
      guard.client.settle(&guard.key, &result, options, fetcher);
      result
    });

    let running = async move {
      match task.await {
        Ok(result) => result,
        Err(e) => Err(format!("fetch task aborted: {}", e)),
      }
    }
    .boxed()
    .shared();

    inner.in_flight.insert(key.clone(), running.clone());
    (running, false)
  }

  fn settle(&self, key: &QueryKey, result: &FetchResult, options: QueryOptions, fetcher: FetcherFn) {
    let now = self.clock.now();
    let mut inner = self.lock();
    inner.in_flight.remove(key);

    match result {
      Ok(data) => {
        inner.entries.insert(
          key.clone(),
          QueryEntry {
            data: data.clone(),
            updated_at: now,
            last_accessed: now,
            options,
            invalidated: false,
            fetcher: Some(fetcher),
          },
        );
      }
      Err(e) => {
        // Previous data, if any, stays in place and stays stale
        debug!(%key, error = %e, "query fetch failed");
      }
    }
  }
}

/// Drops the in-flight record for a key when its fetch task ends without
/// settling, so a panicking fetcher does not leave the key joined to a dead result.
struct InFlightGuard {
  client: QueryClient,
  key: QueryKey,
  armed: bool,
}

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    if self.armed {
      warn!(key = %self.key, "query fetch ended without a result");
      self.client.lock().in_flight.remove(&self.key);
    }
  }
}

fn box_fetcher<F, Fut>(fetcher: F) -> FetcherFn
where
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Value>> + Send + 'static,
{
  Arc::new(move || fetcher().boxed())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use chrono::TimeZone;
  use serde_json::json;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn client() -> (QueryClient, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap());
    (QueryClient::new(Arc::new(clock.clone())), clock)
  }

  fn counting_fetcher(
    counter: Arc<AtomicUsize>,
    data: Value,
  ) -> impl Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static {
    move || {
      let counter = counter.clone();
      let data = data.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok(data)
      }
      .boxed()
    }
  }

  fn failing_fetcher(
    counter: Arc<AtomicUsize>,
  ) -> impl Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static {
    move || {
      let counter = counter.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Err::<Value, _>(eyre!("backend unavailable"))
      }
      .boxed()
    }
  }

  fn panicking_fetcher() -> impl Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static {
    || async { panic!("decoder crashed") }.boxed()
  }

  fn shows_key() -> QueryKey {
    QueryKey::new(["shows"])
  }

  #[tokio::test]
  async fn test_fetch_query_caches_result() {
    let (client, _) = client();
    let counter = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(counter.clone(), json!(["hamlet"]));

    let first = client
      .fetch_query(&shows_key(), fetcher, None)
      .await
      .unwrap();
    let second = client
      .fetch_query(
        &shows_key(),
        counting_fetcher(counter.clone(), json!([])),
        None,
      )
      .await
      .unwrap();

    assert_eq!(first, json!(["hamlet"]));
    assert_eq!(second, json!(["hamlet"]));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_get_never_fetches() {
    let (client, _) = client();
    assert_eq!(client.get(&shows_key()), None);
    assert!(!client.is_fetching(&shows_key()));
  }

  #[tokio::test]
  async fn test_prefetch_fresh_entry_is_noop() {
    let (client, _) = client();
    let counter = Arc::new(AtomicUsize::new(0));
    client.set_query_data(&shows_key(), json!([1]), QueryOptions::default());

    let outcome = client
      .prefetch(
        &shows_key(),
        counting_fetcher(counter.clone(), json!([2])),
        QueryOptions::default(),
      )
      .await;

    assert_eq!(outcome, PrefetchOutcome::Fresh);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(client.get(&shows_key()), Some(json!([1])));
  }

  #[tokio::test]
  async fn test_concurrent_prefetches_share_one_fetch() {
    let (client, _) = client();
    let counter = Arc::new(AtomicUsize::new(0));

    let key = shows_key();
    let prefetches = (0..5).map(|_| {
      client.prefetch(
        &key,
        counting_fetcher(counter.clone(), json!(["hamlet"])),
        QueryOptions::default(),
      )
    });
    let outcomes = futures::future::join_all(prefetches).await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(outcomes[0], PrefetchOutcome::Fetched);
    assert!(outcomes[1..].iter().all(|o| *o == PrefetchOutcome::Joined));
    assert_eq!(client.get(&shows_key()), Some(json!(["hamlet"])));
  }

  #[tokio::test]
  async fn test_panicking_fetcher_does_not_block_key() {
    let (client, _) = client();
    let counter = Arc::new(AtomicUsize::new(0));

    let crashed = client
      .prefetch(
        &shows_key(),
        panicking_fetcher(),
        QueryOptions::default(),
      )
      .await;
    assert!(crashed.is_failure());
    assert!(!client.is_fetching(&shows_key()));

    let retried = client
      .prefetch(
        &shows_key(),
        counting_fetcher(counter.clone(), json!(["hamlet"])),
        QueryOptions::default(),
      )
      .await;
    assert_eq!(retried, PrefetchOutcome::Fetched);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(client.get(&shows_key()), Some(json!(["hamlet"])));
  }

  #[tokio::test]
  async fn test_stale_entry_is_refetched() {
    let (client, clock) = client();
    let counter = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions::new(Duration::minutes(1), Duration::minutes(10));

    client
      .prefetch(&shows_key(), counting_fetcher(counter.clone(), json!(1)), options)
      .await;
    clock.advance(Duration::minutes(2));
    let outcome = client
      .prefetch(&shows_key(), counting_fetcher(counter.clone(), json!(2)), options)
      .await;

    assert_eq!(outcome, PrefetchOutcome::Fetched);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(client.get(&shows_key()), Some(json!(2)));
  }

  #[tokio::test]
  async fn test_lazy_invalidation_is_idempotent() {
    let (client, _) = client();
    let counter = Arc::new(AtomicUsize::new(0));
    client
      .prefetch(
        &shows_key(),
        counting_fetcher(counter.clone(), json!(["hamlet"])),
        QueryOptions::default(),
      )
      .await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    assert!(client.invalidate_stale(&shows_key(), InvalidateOptions::lazy()));
    assert!(client.invalidate_stale(&shows_key(), InvalidateOptions::lazy()));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(!client.is_fetching(&shows_key()));
    assert!(!client.is_fresh(&shows_key()));
    assert_eq!(client.get(&shows_key()), Some(json!(["hamlet"])));
  }

  #[tokio::test]
  async fn test_eager_invalidation_refetches_in_background() {
    let (client, _) = client();
    let counter = Arc::new(AtomicUsize::new(0));
    client
      .prefetch(
        &shows_key(),
        counting_fetcher(counter.clone(), json!(["hamlet"])),
        QueryOptions::default(),
      )
      .await;

    client.invalidate_stale(&shows_key(), InvalidateOptions::eager());
    assert!(client.is_fetching(&shows_key()));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert!(client.is_fresh(&shows_key()));
  }

  #[tokio::test]
  async fn test_invalidate_missing_key() {
    let (client, _) = client();
    assert!(!client.invalidate_stale(&shows_key(), InvalidateOptions::lazy()));
  }

  #[tokio::test]
  async fn test_invalidate_matching_prefix() {
    let (client, _) = client();
    let options = QueryOptions::default();
    client.set_query_data(&QueryKey::new(["shows"]), json!([]), options);
    client.set_query_data(&QueryKey::new(["shows", "hamlet"]), json!({}), options);
    client.set_query_data(&QueryKey::new(["courses"]), json!([]), options);

    let matched = client.invalidate_matching(&QueryKey::new(["shows"]), InvalidateOptions::lazy());

    assert_eq!(matched, 2);
    assert!(!client.is_fresh(&QueryKey::new(["shows", "hamlet"])));
    assert!(client.is_fresh(&QueryKey::new(["courses"])));
  }

  #[tokio::test]
  async fn test_entries_evicted_after_gc_window() {
    let (client, clock) = client();
    let options = QueryOptions::new(Duration::minutes(1), Duration::minutes(10));
    client.set_query_data(&QueryKey::new(["shows"]), json!([]), options);
    client.set_query_data(&QueryKey::new(["courses"]), json!([]), options);

    clock.advance(Duration::minutes(6));
    // Reading keeps an entry alive
    assert!(client.get(&QueryKey::new(["courses"])).is_some());
    clock.advance(Duration::minutes(5));

    assert_eq!(client.collect_garbage(), 1);
    assert_eq!(client.get(&QueryKey::new(["shows"])), None);
    assert!(client.get(&QueryKey::new(["courses"])).is_some());
  }

  #[tokio::test]
  async fn test_failed_prefetch_installs_nothing() {
    let (client, _) = client();
    let counter = Arc::new(AtomicUsize::new(0));

    let outcome = client
      .prefetch(&shows_key(), failing_fetcher(counter.clone()), QueryOptions::default())
      .await;

    assert!(outcome.is_failure());
    assert_eq!(client.get(&shows_key()), None);
    assert!(!client.is_fetching(&shows_key()));
  }

  #[tokio::test]
  async fn test_failed_refetch_serves_stale_data() {
    let (client, _) = client();
    let counter = Arc::new(AtomicUsize::new(0));
    client.set_query_data(&shows_key(), json!(["hamlet"]), QueryOptions::default());
    client.invalidate_stale(&shows_key(), InvalidateOptions::lazy());

    let data = client
      .fetch_query(&shows_key(), failing_fetcher(counter.clone()), None)
      .await
      .unwrap();

    assert_eq!(data, json!(["hamlet"]));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(!client.is_fresh(&shows_key()));
  }

  #[tokio::test]
  async fn test_fetch_query_error_without_cache() {
    let (client, _) = client();
    let counter = Arc::new(AtomicUsize::new(0));

    let result = client
      .fetch_query(&shows_key(), failing_fetcher(counter), None)
      .await;

    let message = result.unwrap_err().to_string();
    assert!(message.contains("backend unavailable"));
  }

  #[tokio::test]
  async fn test_fetch_query_as_decodes() {
    let (client, _) = client();
    let counter = Arc::new(AtomicUsize::new(0));

    let titles: Vec<String> = client
      .fetch_query_as(&shows_key(), counting_fetcher(counter, json!(["hamlet"])), None)
      .await
      .unwrap();

    assert_eq!(titles, vec!["hamlet".to_string()]);
  }

  #[test]
  fn test_clear_drops_everything() {
    let (client, _) = client();
    client.set_query_data(&shows_key(), json!([]), QueryOptions::default());
    client.set_query_data(&QueryKey::new(["courses"]), json!([]), QueryOptions::default());

    assert_eq!(client.clear(), 2);
    assert!(client.is_empty());
  }
}
