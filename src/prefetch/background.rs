//! Deferred and periodic background cache maintenance.

use color_eyre::Result;
use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::query::{InvalidateOptions, QueryClient, QueryKey, QueryOptions};
use crate::site::{CachedSiteClient, SiteQueryKey};

/// `interval_at` panics on a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

type JobFetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// One key the deferred batch warms.
#[derive(Clone)]
struct PrefetchJob {
  key: QueryKey,
  fetcher: JobFetcher,
  options: QueryOptions,
}

/// What the scheduler does on each timer.
#[derive(Clone, Default)]
pub struct SyncPlan {
  prefetch: Vec<PrefetchJob>,
  /// Key prefixes marked stale, without refetching
  invalidate: Vec<QueryKey>,
}

impl SyncPlan {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn prefetch<F>(mut self, key: QueryKey, fetcher: F, options: QueryOptions) -> Self
  where
    F: Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
  {
    self.prefetch.push(PrefetchJob {
      key,
      fetcher: Arc::new(fetcher),
      options,
    });
    self
  }

  pub fn invalidate(mut self, prefix: QueryKey) -> Self {
    self.invalidate.push(prefix);
    self
  }

  /// Warm the listings every page needs, and let detail pages and CMS copy go
  /// stale so their next read picks up edits.
  pub fn for_site(site: &CachedSiteClient, options: QueryOptions) -> Self {
    let mut plan = Self::new();
    for key in [SiteQueryKey::Shows, SiteQueryKey::Courses, SiteQueryKey::HeroImages] {
      let query_key = key.query_key();
      plan = plan.prefetch(query_key, site.fetcher(key), options);
    }
    plan
      .invalidate(QueryKey::new(["show"]))
      .invalidate(QueryKey::new(["page-content"]))
  }
}

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
  /// Not started, stopped, or nothing left to fire
  Idle,
  /// Waiting for the one-shot deferred batch
  DeferredPending,
  /// Deferred batch done, periodic timer running
  PeriodicActive,
}

#[derive(Debug, Default)]
struct Status {
  deferred_pending: bool,
  periodic_active: bool,
  deferred_runs: u64,
  periodic_runs: u64,
}

struct Running {
  shutdown: watch::Sender<bool>,
  deferred: JoinHandle<()>,
  periodic: JoinHandle<()>,
}

/// Owns the background timers for one session.
///
/// `start()` arms a one-shot deferred timer that warms the cache and a
/// repeating timer that marks keys stale. Neither timer forces a refetch of
/// data someone is reading; they spread network work out after startup.
pub struct BackgroundSync {
  queries: QueryClient,
  plan: Arc<SyncPlan>,
  defer: Duration,
  period: Duration,
  status: Arc<Mutex<Status>>,
  running: Option<Running>,
}

impl BackgroundSync {
  pub fn new(queries: QueryClient, plan: SyncPlan) -> Self {
    Self {
      queries,
      plan: Arc::new(plan),
      defer: Duration::from_secs(3),
      period: Duration::from_secs(5 * 60),
      status: Arc::new(Mutex::new(Status::default())),
      running: None,
    }
  }

  /// Override the batch timing. A zero period is raised to one millisecond.
  pub fn with_timing(mut self, defer: Duration, period: Duration) -> Self {
    self.defer = defer;
    self.period = period.max(MIN_PERIOD);
    self
  }

  pub fn state(&self) -> SchedulerState {
    let status = self.status.lock().unwrap_or_else(|e| e.into_inner());
    if status.deferred_pending {
      SchedulerState::DeferredPending
    } else if status.periodic_active {
      SchedulerState::PeriodicActive
    } else {
      SchedulerState::Idle
    }
  }

  /// How many deferred and periodic batches have run.
  pub fn runs(&self) -> (u64, u64) {
    let status = self.status.lock().unwrap_or_else(|e| e.into_inner());
    (status.deferred_runs, status.periodic_runs)
  }

  /// Arm both timers. Does nothing if they are already armed.
  pub fn start(&mut self) {
    if self.running.is_some() {
      return;
    }

    {
      let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
      status.deferred_pending = true;
      status.periodic_active = true;
    }

    let (shutdown, shutdown_rx) = watch::channel(false);
    let deferred = tokio::spawn(deferred_timer(
      self.queries.clone(),
      Arc::clone(&self.plan),
      Arc::clone(&self.status),
      self.defer,
      shutdown_rx.clone(),
    ));
    let periodic = tokio::spawn(periodic_timer(
      self.queries.clone(),
      Arc::clone(&self.plan),
      Arc::clone(&self.status),
      self.period,
      shutdown_rx,
    ));

    debug!(defer = ?self.defer, period = ?self.period, "background sync started");
    self.running = Some(Running {
      shutdown,
      deferred,
      periodic,
    });
  }

  /// Disarm both timers. A batch already running finishes; no new one starts.
  pub fn stop(&mut self) {
    if let Some(running) = self.running.take() {
      let _ = running.shutdown.send(true);
      self.mark_stopped();
      debug!("background sync stopped");
    }
  }

  /// Stop and wait for both timer tasks to exit.
  pub async fn shutdown(mut self) {
    if let Some(running) = self.running.take() {
      let _ = running.shutdown.send(true);
      self.mark_stopped();
      let _ = running.deferred.await;
      let _ = running.periodic.await;
    }
  }

  fn mark_stopped(&self) {
    let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
    status.deferred_pending = false;
    status.periodic_active = false;
  }
}

impl Drop for BackgroundSync {
  fn drop(&mut self) {
    self.stop();
  }
}

async fn deferred_timer(
  queries: QueryClient,
  plan: Arc<SyncPlan>,
  status: Arc<Mutex<Status>>,
  defer: Duration,
  mut shutdown: watch::Receiver<bool>,
) {
  tokio::select! {
    biased;
    _ = shutdown.changed() => {}
    _ = tokio::time::sleep(defer) => {
      run_deferred_batch(&queries, &plan).await;
      status.lock().unwrap_or_else(|e| e.into_inner()).deferred_runs += 1;
    }
  }

  status
    .lock()
    .unwrap_or_else(|e| e.into_inner())
    .deferred_pending = false;
}

async fn periodic_timer(
  queries: QueryClient,
  plan: Arc<SyncPlan>,
  status: Arc<Mutex<Status>>,
  period: Duration,
  mut shutdown: watch::Receiver<bool>,
) {
  let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    tokio::select! {
      biased;
      _ = shutdown.changed() => break,
      _ = ticker.tick() => {
        run_periodic_batch(&queries, &plan);
        status.lock().unwrap_or_else(|e| e.into_inner()).periodic_runs += 1;
      }
    }
  }
}

async fn run_deferred_batch(queries: &QueryClient, plan: &SyncPlan) {
  let prefetches = plan.prefetch.iter().map(|job| {
    let fetcher = Arc::clone(&job.fetcher);
    queries.prefetch(&job.key, move || fetcher(), job.options)
  });
  let outcomes = join_all(prefetches).await;
  let failed = outcomes.iter().filter(|o| o.is_failure()).count();

  let invalidated = invalidate_batch(queries, plan);
  info!(
    prefetched = outcomes.len() - failed,
    failed, invalidated, "deferred background sync finished"
  );
}

fn run_periodic_batch(queries: &QueryClient, plan: &SyncPlan) {
  let invalidated = invalidate_batch(queries, plan);
  let evicted = queries.collect_garbage();
  debug!(invalidated, evicted, "periodic background sync tick");
}

fn invalidate_batch(queries: &QueryClient, plan: &SyncPlan) -> usize {
  plan
    .invalidate
    .iter()
    .map(|prefix| queries.invalidate_matching(prefix, InvalidateOptions::lazy()))
    .sum()
}
