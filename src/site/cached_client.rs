//! Cached site client that routes every read through the response cache.

use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::cache::DurableCache;
use crate::query::{InvalidateOptions, QueryClient, QueryOptions};

use super::client::SiteApi;
use super::keys::SiteQueryKey;
use super::types::{Course, CourseMetadata, HeroImage, PageContent, Show, ShowDetail};

/// Site client with transparent caching.
///
/// Reads go through the shared [`QueryClient`], so a page that was prefetched
/// on hover (or by the background scheduler) is served without a second
/// request. Course metadata additionally survives restarts in the durable cache.
#[derive(Clone)]
pub struct CachedSiteClient {
  api: Arc<dyn SiteApi>,
  queries: QueryClient,
  durable: Arc<DurableCache>,
}

impl CachedSiteClient {
  pub fn new(api: Arc<dyn SiteApi>, queries: QueryClient, durable: Arc<DurableCache>) -> Self {
    Self {
      api,
      queries,
      durable,
    }
  }

  pub fn queries(&self) -> &QueryClient {
    &self.queries
  }

  pub fn api(&self) -> Arc<dyn SiteApi> {
    Arc::clone(&self.api)
  }

  /// Fetcher producing the JSON data for `key`.
  pub fn fetcher(
    &self,
    key: SiteQueryKey,
  ) -> impl Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static {
    let api = Arc::clone(&self.api);
    let key = key.normalized();
    move || {
      let api = Arc::clone(&api);
      let key = key.clone();
      async move {
        debug!(what = %key.description(), "fetching site data");
        match key {
          SiteQueryKey::Shows => to_value(api.list_shows().await?),
          SiteQueryKey::ShowDetail { slug } => to_value(api.get_show(slug).await?),
          SiteQueryKey::Courses => to_value(api.list_courses().await?),
          SiteQueryKey::CourseMetadata => to_value(api.course_metadata().await?),
          SiteQueryKey::PageContent { page } => to_value(api.page_content(page).await?),
          SiteQueryKey::HeroImages => to_value(api.hero_images().await?),
        }
      }
      .boxed()
    }
  }

  pub async fn shows(&self) -> Result<Vec<Show>> {
    self.read(SiteQueryKey::Shows, None).await
  }

  pub async fn show(&self, slug: &str) -> Result<ShowDetail> {
    self.read(SiteQueryKey::show_detail(slug), None).await
  }

  pub async fn courses(&self) -> Result<Vec<Course>> {
    self.read(SiteQueryKey::Courses, None).await
  }

  pub async fn page_content(&self, page: &str) -> Result<PageContent> {
    self.read(SiteQueryKey::page_content(page), None).await
  }

  pub async fn hero_images(&self) -> Result<Vec<HeroImage>> {
    self.read(SiteQueryKey::HeroImages, None).await
  }

  /// Course metadata, served from the durable cache while its record is valid.
  ///
  /// Whatever is returned is mirrored into the response cache so in-memory
  /// readers see the same snapshot.
  pub async fn course_metadata(&self) -> Result<CourseMetadata> {
    let key = SiteQueryKey::CourseMetadata.query_key();
    let metadata = match self.durable.read_query::<CourseMetadata>(&key) {
      Some(cached) => cached,
      None => {
        let fetched = self.api.course_metadata().await?;
        self.durable.write_query(&key, &fetched);
        fetched
      }
    };

    let options = QueryOptions::new(self.durable.ttl(), self.queries.defaults().gc_time);
    self
      .queries
      .set_query_data(&key, to_value(&metadata)?, options);
    Ok(metadata)
  }

  /// Drop the durable course metadata record so the next read refetches.
  pub fn invalidate_course_metadata(&self) {
    let key = SiteQueryKey::CourseMetadata.query_key();
    self.durable.invalidate_query(&key);
    self
      .queries
      .invalidate_stale(&key, InvalidateOptions::lazy());
  }

  async fn read<T: serde::de::DeserializeOwned>(
    &self,
    key: SiteQueryKey,
    options: Option<QueryOptions>,
  ) -> Result<T> {
    let query_key = key.query_key();
    let fetcher = self.fetcher(key);
    self
      .queries
      .fetch_query_as(&query_key, fetcher, options)
      .await
  }
}

fn to_value<T: Serialize>(data: T) -> Result<Value> {
  serde_json::to_value(data).map_err(|e| eyre!("Failed to encode response: {}", e))
}
