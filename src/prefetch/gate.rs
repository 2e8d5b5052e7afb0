//! Once-per-session guard around the course catalogue sync.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::cache::LocalStore;
use crate::clock::SharedClock;
use crate::site::types::SyncReport;

const LAST_SYNC_KEY: &str = "limelight:course-sync:last-completed";

/// The background action the gate protects.
pub trait SyncAction: Send + Sync + 'static {
  fn run(&self) -> BoxFuture<'static, Result<SyncReport>>;
}

/// Whether this session should run the sync at all.
///
/// Only [`SmartSyncGate`] reads or writes it.
pub trait SyncEligibility: Send + Sync {
  fn should_run(&self) -> bool;

  fn record_completion(&self);
}

/// Eligible when the last recorded completion is older than `min_interval`.
pub struct IntervalEligibility {
  store: Arc<dyn LocalStore>,
  clock: SharedClock,
  min_interval: Duration,
}

impl IntervalEligibility {
  pub fn new(store: Arc<dyn LocalStore>, clock: SharedClock, min_interval: Duration) -> Self {
    Self {
      store,
      clock,
      min_interval,
    }
  }

  /// Forget the last completion so the next session syncs again.
  pub fn reset(&self) -> Result<()> {
    self.store.remove_item(LAST_SYNC_KEY)
  }

  fn last_completed(&self) -> Option<DateTime<Utc>> {
    let raw = match self.store.get_item(LAST_SYNC_KEY) {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(error = %e, "could not read last course sync time");
        return None;
      }
    };
    raw
      .parse::<i64>()
      .ok()
      .and_then(DateTime::from_timestamp_millis)
  }
}

impl SyncEligibility for IntervalEligibility {
  fn should_run(&self) -> bool {
    match self.last_completed() {
      Some(at) => self.clock.now() - at >= self.min_interval,
      None => true,
    }
  }

  fn record_completion(&self) {
    let now = self.clock.now().timestamp_millis().to_string();
    if let Err(e) = self.store.set_item(LAST_SYNC_KEY, &now) {
      warn!(error = %e, "could not record course sync time");
    }
  }
}

/// Where the gate is within the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
  Idle,
  InProgress,
  Completed,
}

/// What a trigger did.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
  AlreadyRunning,
  AlreadyCompleted,
  /// Not eligible; the gate is now completed for this session
  Skipped,
  Synced(SyncReport),
  /// The action failed; the gate may be triggered again
  Failed(String),
}

/// Runs one [`SyncAction`] at most once per session and never concurrently.
///
/// Triggers never return errors. Failures are logged and leave the gate idle so
/// a later trigger can retry; success and ineligibility both complete it.
#[derive(Clone)]
pub struct SmartSyncGate {
  action: Arc<dyn SyncAction>,
  eligibility: Arc<dyn SyncEligibility>,
  phase: Arc<Mutex<GatePhase>>,
}

impl SmartSyncGate {
  pub fn new(action: Arc<dyn SyncAction>, eligibility: Arc<dyn SyncEligibility>) -> Self {
    Self {
      action,
      eligibility,
      phase: Arc::new(Mutex::new(GatePhase::Idle)),
    }
  }

  fn lock(&self) -> MutexGuard<'_, GatePhase> {
    self.phase.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub fn phase(&self) -> GatePhase {
    *self.lock()
  }

  pub async fn trigger(&self) -> GateOutcome {
    let guard = {
      let mut phase = self.lock();
      match *phase {
        GatePhase::InProgress => return GateOutcome::AlreadyRunning,
        GatePhase::Completed => return GateOutcome::AlreadyCompleted,
        GatePhase::Idle => {}
      }

      if !self.eligibility.should_run() {
        *phase = GatePhase::Completed;
        debug!("course sync not due this session");
        return GateOutcome::Skipped;
      }

      *phase = GatePhase::InProgress;
      PhaseGuard {
        phase: Arc::clone(&self.phase),
      }
    };

    match self.action.run().await {
      Ok(report) => {
        self.eligibility.record_completion();
        guard.finish(GatePhase::Completed);
        info!(
          inserted = report.inserted,
          updated = report.updated,
          removed = report.removed,
          "course sync finished"
        );
        GateOutcome::Synced(report)
      }
      Err(e) => {
        guard.finish(GatePhase::Idle);
        warn!(error = %e, "course sync failed");
        GateOutcome::Failed(e.to_string())
      }
    }
  }
}

/// Leaves `InProgress` when dropped, so a cancelled trigger cannot wedge the gate.
struct PhaseGuard {
  phase: Arc<Mutex<GatePhase>>,
}

impl PhaseGuard {
  fn finish(self, to: GatePhase) {
    *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = to;
  }
}

impl Drop for PhaseGuard {
  fn drop(&mut self) {
    let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
    if *phase == GatePhase::InProgress {
      *phase = GatePhase::Idle;
    }
  }
}
