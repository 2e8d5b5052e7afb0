//! Speculative prefetching when a visitor shows intent (hover, focus).

use color_eyre::Result;
use serde_json::Value;
use std::future::Future;
use tracing::debug;

use crate::query::{PrefetchOutcome, QueryClient, QueryKey, QueryOptions};
use crate::site::{CachedSiteClient, SiteQueryKey};

/// Prefetches detail data for whatever the visitor is about to open.
///
/// Every entry point shares one policy: if anything is cached for the key,
/// do nothing; otherwise prefetch with the long intent windows. Repeated
/// hovers over the same link therefore cost at most one request per
/// staleness window.
#[derive(Clone)]
pub struct IntentPrefetcher {
  site: CachedSiteClient,
  options: QueryOptions,
}

impl IntentPrefetcher {
  pub fn new(site: CachedSiteClient, options: QueryOptions) -> Self {
    Self { site, options }
  }

  fn queries(&self) -> &QueryClient {
    self.site.queries()
  }

  /// Prefetch `key` unless it is already cached.
  pub async fn prefetch_on_intent<F, Fut>(&self, key: &QueryKey, fetcher: F) -> PrefetchOutcome
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
  {
    if self.queries().get(key).is_some() {
      debug!(%key, "intent prefetch skipped, already cached");
      return PrefetchOutcome::Cached;
    }

    self.queries().prefetch(key, fetcher, self.options).await
  }

  /// Hovering a link to a show page.
  pub async fn prefetch_show(&self, slug: &str) -> PrefetchOutcome {
    self.prefetch_site(SiteQueryKey::show_detail(slug)).await
  }

  /// Hovering a navigation link to a content page.
  pub async fn prefetch_page_content(&self, page: &str) -> PrefetchOutcome {
    self.prefetch_site(SiteQueryKey::page_content(page)).await
  }

  async fn prefetch_site(&self, key: SiteQueryKey) -> PrefetchOutcome {
    let query_key = key.query_key();
    let fetcher = self.site.fetcher(key);
    self.prefetch_on_intent(&query_key, fetcher).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{DurableCache, MemoryStore};
  use crate::clock::{ManualClock, SharedClock};
  use crate::site::fake::FakeSite;
  use chrono::{Duration, TimeZone, Utc};
  use futures::future::join_all;
  use std::sync::Arc;

  fn setup(fake: FakeSite) -> (IntentPrefetcher, Arc<FakeSite>, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap());
    let shared: SharedClock = Arc::new(clock.clone());
    let fake = Arc::new(fake);
    let durable = Arc::new(DurableCache::new(Arc::new(MemoryStore::new()), shared.clone()));
    let site = CachedSiteClient::new(fake.clone(), QueryClient::new(shared), durable);
    let options = QueryOptions::new(Duration::minutes(30), Duration::minutes(60));
    (IntentPrefetcher::new(site, options), fake, clock)
  }

  #[tokio::test]
  async fn test_cached_show_issues_no_fetch() {
    let (prefetcher, fake, _) = setup(FakeSite::new());
    prefetcher.site.show("hamlet").await.unwrap();
    assert_eq!(fake.calls("get_show"), 1);

    let outcome = prefetcher.prefetch_show("hamlet").await;

    assert_eq!(outcome, PrefetchOutcome::Cached);
    assert_eq!(fake.calls("get_show"), 1);
  }

  #[tokio::test]
  async fn test_repeated_hovers_fetch_once() {
    let fake = FakeSite::new().with_delay(std::time::Duration::from_millis(30));
    let (prefetcher, fake, _) = setup(fake);

    let hovers = (0..8).map(|_| prefetcher.prefetch_show("hamlet"));
    let outcomes = join_all(hovers).await;

    assert_eq!(fake.calls("get_show"), 1);
    assert!(outcomes.iter().all(|o| !o.is_failure()));
    assert!(prefetcher
      .queries()
      .get(&QueryKey::new(["show", "hamlet"]))
      .is_some());
  }

  #[tokio::test]
  async fn test_hover_after_settle_is_cached() {
    let (prefetcher, fake, clock) = setup(FakeSite::new());

    assert_eq!(prefetcher.prefetch_page_content("about").await, PrefetchOutcome::Fetched);
    clock.advance(Duration::minutes(29));
    assert_eq!(prefetcher.prefetch_page_content("about").await, PrefetchOutcome::Cached);

    assert_eq!(fake.calls("page_content"), 1);
  }

  #[tokio::test]
  async fn test_hover_with_untidy_slug_caches_canonical_page() {
    let (prefetcher, fake, _) = setup(FakeSite::new());

    prefetcher.prefetch_page_content("/About/").await;

    let cached = prefetcher
      .queries()
      .get(&QueryKey::new(["page-content", "about"]))
      .unwrap();
    assert_eq!(cached["slug"], "about");
    assert_eq!(prefetcher.prefetch_page_content("about").await, PrefetchOutcome::Cached);
    assert_eq!(fake.calls("page_content"), 1);
  }

  #[tokio::test]
  async fn test_intent_entries_use_long_windows() {
    let (prefetcher, _, clock) = setup(FakeSite::new());
    let key = QueryKey::new(["page-content", "about"]);

    prefetcher.prefetch_page_content("about").await;
    clock.advance(Duration::minutes(20));

    // Still fresh under the 30 minute intent window
    assert!(prefetcher.queries().is_fresh(&key));
    clock.advance(Duration::minutes(15));
    assert!(!prefetcher.queries().is_fresh(&key));
  }

  #[tokio::test]
  async fn test_failed_hover_is_swallowed_and_retried() {
    let (prefetcher, fake, _) = setup(FakeSite::new());
    fake.fail("get_show");

    let outcome = prefetcher.prefetch_show("macbeth").await;
    assert!(outcome.is_failure());

    fake.recover("get_show");
    assert_eq!(prefetcher.prefetch_show("macbeth").await, PrefetchOutcome::Fetched);
    assert_eq!(fake.calls("get_show"), 2);
  }
}
