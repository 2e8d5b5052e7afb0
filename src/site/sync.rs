use color_eyre::Result;
use futures::future::{BoxFuture, FutureExt};

use super::cached_client::CachedSiteClient;
use super::keys::SiteQueryKey;
use super::types::SyncReport;
use crate::prefetch::SyncAction;
use crate::query::InvalidateOptions;

/// Reconciles the course catalogue with the booking system, then marks every
/// cached copy of course data stale.
#[derive(Clone)]
pub struct CourseCatalogSync {
  site: CachedSiteClient,
}

impl CourseCatalogSync {
  pub fn new(site: CachedSiteClient) -> Self {
    Self { site }
  }
}

impl SyncAction for CourseCatalogSync {
  fn run(&self) -> BoxFuture<'static, Result<SyncReport>> {
    let site = self.site.clone();
    async move {
      let report = site.api().sync_courses().await?;

      site
        .queries()
        .invalidate_stale(&SiteQueryKey::Courses.query_key(), InvalidateOptions::lazy());
      site.invalidate_course_metadata();
      Ok(report)
    }
    .boxed()
  }
}
