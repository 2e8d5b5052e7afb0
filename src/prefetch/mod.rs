//! Speculative loading and background coordination on top of the caches.
//!
//! - [`ImagePreloadCache`] warms image URLs once per session
//! - [`IntentPrefetcher`] fetches detail data when a visitor hovers a link
//! - [`BackgroundSync`] runs a deferred warm-up batch and periodic stale marking
//! - [`SmartSyncGate`] runs the course catalogue sync once per session

mod background;
mod gate;
mod images;
mod intent;

pub use background::{BackgroundSync, SchedulerState, SyncPlan};
pub use gate::{
  GateOutcome, GatePhase, IntervalEligibility, SmartSyncGate, SyncAction, SyncEligibility,
};
pub use images::{HttpImageLoader, ImageLoader, ImagePreloadCache};
pub use intent::IntentPrefetcher;
