//! The per-process owner of every cache and scheduler.

use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::{DurableCache, LocalStore, MemoryStore, NoopStore, SqliteStore};
use crate::clock::{self, SharedClock};
use crate::config::{CacheConfig, Config};
use crate::prefetch::{
  BackgroundSync, GatePhase, HttpImageLoader, ImageLoader, ImagePreloadCache,
  IntentPrefetcher, IntervalEligibility, SchedulerState, SmartSyncGate, SyncEligibility, SyncPlan,
};
use crate::query::{EntryStatus, InvalidateOptions, QueryClient, QueryKey};
use crate::site::types::CourseMetadata;
use crate::site::{CachedSiteClient, CourseCatalogSync, SiteApi, SiteClient, SiteQueryKey};

/// Snapshot of the in-memory caches for display.
#[derive(Debug, Clone)]
pub struct SessionStatus {
  pub entries: Vec<EntryStatus>,
  pub images_loaded: usize,
  pub images_pending: usize,
  pub scheduler: SchedulerState,
  /// Deferred and periodic batches run so far
  pub scheduler_runs: (u64, u64),
  pub gate: GatePhase,
}

/// What is on disk, readable without starting a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredStatus {
  pub course_metadata_cached: bool,
  pub course_sync_due: bool,
}

/// One visitor session: the caches, the prefetchers and the background work
/// that feeds them.
///
/// Built once and handed to whatever drives it; nothing here is global.
pub struct Session {
  site: CachedSiteClient,
  images: ImagePreloadCache,
  intent: IntentPrefetcher,
  background: BackgroundSync,
  gate: SmartSyncGate,
  image_urls: Vec<String>,
}

impl Session {
  /// Build a session talking to the configured backend and CMS.
  pub fn open(config: &Config, persist: bool) -> Result<Self> {
    let store = open_store(&config.cache, persist)?;
    let api = Arc::new(SiteClient::new(config)?);
    let loader = Arc::new(HttpImageLoader::new(Duration::from_secs(
      config.backend.timeout_secs,
    ))?);
    Ok(Self::assemble(config, api, loader, store, clock::system()))
  }

  pub fn assemble(
    config: &Config,
    api: Arc<dyn SiteApi>,
    loader: Arc<dyn ImageLoader>,
    store: Arc<dyn LocalStore>,
    clock: SharedClock,
  ) -> Self {
    let queries = QueryClient::new(clock.clone()).with_defaults(config.cache.query_options());
    let durable = Arc::new(
      DurableCache::new(Arc::clone(&store), clock.clone()).with_ttl(config.cache.durable_ttl()),
    );
    let site = CachedSiteClient::new(api, queries.clone(), durable);

    let plan = SyncPlan::for_site(&site, queries.defaults());
    let background = BackgroundSync::new(queries, plan)
      .with_timing(config.sync.defer(), config.sync.period());

    let eligibility = Arc::new(IntervalEligibility::new(
      store,
      clock,
      config.sync.min_interval(),
    ));
    let gate = SmartSyncGate::new(
      Arc::new(CourseCatalogSync::new(site.clone())),
      eligibility,
    );

    Self {
      intent: IntentPrefetcher::new(site.clone(), config.prefetch.intent_options()),
      images: ImagePreloadCache::new(loader),
      site,
      background,
      gate,
      image_urls: config.images.clone(),
    }
  }

  #[cfg(test)]
  pub fn site(&self) -> &CachedSiteClient {
    &self.site
  }

  pub fn queries(&self) -> &QueryClient {
    self.site.queries()
  }

  pub fn intent(&self) -> &IntentPrefetcher {
    &self.intent
  }

  pub fn images(&self) -> &ImagePreloadCache {
    &self.images
  }

  pub fn gate(&self) -> &SmartSyncGate {
    &self.gate
  }

  /// Arm the background timers, preload the configured images and fire the
  /// course sync gate. Returns immediately.
  pub fn start(&mut self) {
    self.background.start();

    let images = self.images.clone();
    let urls = self.image_urls.clone();
    tokio::spawn(async move {
      let results = images.preload_all(&urls).await;
      let loaded = results.iter().filter(|ok| **ok).count();
      debug!(loaded, total = results.len(), "startup images preloaded");
    });

    let gate = self.gate.clone();
    tokio::spawn(async move {
      gate.trigger().await;
    });

    info!(images = self.image_urls.len(), "session started");
  }

  /// Mark every entry under `prefix` stale. With `refetch`, entries are
  /// refetched in the background right away instead of on their next read.
  pub fn invalidate(&self, prefix: &QueryKey, refetch: bool) -> usize {
    let options = if refetch {
      InvalidateOptions::eager()
    } else {
      InvalidateOptions::lazy()
    };
    self.queries().invalidate_matching(prefix, options)
  }

  /// Forget every in-memory response and preloaded image. Durable records stay.
  pub fn clear_memory(&self) -> usize {
    self.images.clear();
    self.queries().clear()
  }

  pub fn status(&self) -> SessionStatus {
    SessionStatus {
      entries: self.queries().entries(),
      images_loaded: self.images.len(),
      images_pending: self.images.pending_count(),
      scheduler: self.background.state(),
      scheduler_runs: self.background.runs(),
      gate: self.gate.phase(),
    }
  }

  /// Stop the background timers and wait for them to exit.
  pub async fn shutdown(self) {
    self.background.shutdown().await;
    info!("session closed");
  }

  /// Inspect the durable store without starting a session.
  pub fn stored_status(config: &Config, persist: bool) -> Result<StoredStatus> {
    let store = open_store(&config.cache, persist)?;
    let clock = clock::system();
    let durable =
      DurableCache::new(Arc::clone(&store), clock.clone()).with_ttl(config.cache.durable_ttl());
    let eligibility = IntervalEligibility::new(store, clock, config.sync.min_interval());

    Ok(StoredStatus {
      course_metadata_cached: durable
        .read_query::<CourseMetadata>(&SiteQueryKey::CourseMetadata.query_key())
        .is_some(),
      course_sync_due: eligibility.should_run(),
    })
  }

  /// Remove every durable record this crate writes.
  pub fn clear_stored(config: &Config, persist: bool) -> Result<()> {
    let store = open_store(&config.cache, persist)?;
    let clock = clock::system();
    DurableCache::new(Arc::clone(&store), clock.clone())
      .invalidate_query(&SiteQueryKey::CourseMetadata.query_key());
    IntervalEligibility::new(store, clock, config.sync.min_interval()).reset()
  }
}

/// Pick the durable store.
///
/// `cache.persist: false` turns durable caching off entirely. The `persist`
/// flag (cleared by `--no-persist`) keeps records for this process only.
pub fn open_store(config: &CacheConfig, persist: bool) -> Result<Arc<dyn LocalStore>> {
  if !config.persist {
    return Ok(Arc::new(NoopStore));
  }
  if !persist {
    return Ok(Arc::new(MemoryStore::new()));
  }

  let store = match &config.path {
    Some(path) => SqliteStore::open_at(path)?,
    None => SqliteStore::open()?,
  };
  Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use crate::prefetch::GateOutcome;
  use crate::query::PrefetchOutcome;
  use crate::site::fake::FakeSite;
  use chrono::{TimeZone, Utc};
  use color_eyre::eyre::eyre;
  use futures::future::{BoxFuture, FutureExt};

  struct StaticLoader;

  impl ImageLoader for StaticLoader {
    fn load(&self, url: String) -> BoxFuture<'static, Result<()>> {
      async move {
        if url.ends_with(".jpg") {
          Ok(())
        } else {
          Err(eyre!("{} is not an image", url))
        }
      }
      .boxed()
    }
  }

  const CONFIG: &str = r#"
backend:
  url: https://backend.example.org
cms:
  url: https://cms.example.org
images:
  - https://cms.example.org/hero/home.jpg
  - https://cms.example.org/hero/about.jpg
"#;

  fn session(store: Arc<dyn LocalStore>) -> (Session, Arc<FakeSite>) {
    let config = Config::parse(CONFIG).unwrap();
    let clock: SharedClock = Arc::new(ManualClock::new(
      Utc.with_ymd_and_hms(2026, 10, 16, 19, 0, 0).unwrap(),
    ));
    let fake = Arc::new(FakeSite::new());
    let session = Session::assemble(&config, fake.clone(), Arc::new(StaticLoader), store, clock);
    (session, fake)
  }

  #[tokio::test(start_paused = true)]
  async fn test_start_warms_caches_and_syncs_once() {
    let (mut session, fake) = session(Arc::new(MemoryStore::new()));
    session.start();

    tokio::time::sleep(Duration::from_secs(4)).await;

    let status = session.status();
    assert_eq!(status.images_loaded, 2);
    assert_eq!(status.gate, GatePhase::Completed);
    assert_eq!(status.scheduler, SchedulerState::PeriodicActive);
    assert_eq!(fake.calls("sync_courses"), 1);
    assert_eq!(fake.calls("list_shows"), 1);
    assert!(status.entries.iter().any(|e| e.key == QueryKey::new(["shows"])));

    assert_eq!(session.gate().trigger().await, GateOutcome::AlreadyCompleted);
    session.shutdown().await;
  }

  #[tokio::test]
  async fn test_hover_then_read_hits_cache() {
    let (session, fake) = session(Arc::new(MemoryStore::new()));

    assert_eq!(session.intent().prefetch_show("hamlet").await, PrefetchOutcome::Fetched);
    let show = session.site().show("hamlet").await.unwrap();

    assert_eq!(show.slug, "hamlet");
    assert_eq!(fake.calls("get_show"), 1);
  }

  #[tokio::test]
  async fn test_invalidate_marks_prefix_stale() {
    let (session, fake) = session(Arc::new(MemoryStore::new()));
    session.intent().prefetch_page_content("about").await;
    session.intent().prefetch_page_content("contact").await;

    assert_eq!(session.invalidate(&QueryKey::new(["page-content"]), false), 2);
    assert!(session.status().entries.iter().all(|e| e.is_stale));
    assert_eq!(fake.calls("page_content"), 2);
  }

  #[tokio::test]
  async fn test_invalidate_with_refetch() {
    let (session, fake) = session(Arc::new(MemoryStore::new()));
    session.intent().prefetch_show("hamlet").await;

    assert_eq!(session.invalidate(&QueryKey::new(["show"]), true), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(fake.calls("get_show"), 2);
    assert!(session.status().entries.iter().all(|e| !e.is_stale));
  }

  #[tokio::test]
  async fn test_completed_sync_is_not_due_for_next_session() {
    let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());

    let (first, fake) = session(Arc::clone(&store));
    assert!(matches!(first.gate().trigger().await, GateOutcome::Synced(_)));

    let (second, _) = session(store);
    assert_eq!(second.gate().trigger().await, GateOutcome::Skipped);
    assert_eq!(fake.calls("sync_courses"), 1);
  }

  #[tokio::test]
  async fn test_preload_image_reports_failure() {
    let (session, _) = session(Arc::new(MemoryStore::new()));

    assert!(session.images().preload("https://cms.example.org/a.jpg").await);
    assert!(!session.images().preload("https://cms.example.org/a.pdf").await);
    assert_eq!(session.status().images_loaded, 1);
  }

  #[tokio::test]
  async fn test_clear_memory_keeps_durable_records() {
    let (session, fake) = session(Arc::new(MemoryStore::new()));
    session.site().course_metadata().await.unwrap();
    session.intent().prefetch_show("hamlet").await;
    session.images().preload("https://cms.example.org/a.jpg").await;

    assert_eq!(session.clear_memory(), 2);
    assert_eq!(session.status().images_loaded, 0);

    session.site().course_metadata().await.unwrap();
    assert_eq!(fake.calls("course_metadata"), 1);
  }

  #[test]
  fn test_no_persist_uses_memory_store() {
    let config = Config::parse(CONFIG).unwrap();
    let store = open_store(&config.cache, false).unwrap();

    store.set_item("k", "v").unwrap();
    assert_eq!(store.get_item("k").unwrap(), Some("v".to_string()));
  }

  #[test]
  fn test_persist_disabled_in_config_stores_nothing() {
    let yaml = format!("{}cache:\n  persist: false\n", CONFIG);
    let config = Config::parse(&yaml).unwrap();
    let store = open_store(&config.cache, true).unwrap();

    store.set_item("k", "v").unwrap();
    assert_eq!(store.get_item("k").unwrap(), None);
  }
}
