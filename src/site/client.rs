use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::types::{Course, CourseMetadata, HeroImage, PageContent, Show, ShowDetail, SyncReport};
use crate::config::Config;

/// Remote reads and procedures the cache layer fetches through.
///
/// Methods take owned arguments and return `'static` futures so they can be
/// stored inside cache fetchers.
pub trait SiteApi: Send + Sync + 'static {
  fn list_shows(&self) -> BoxFuture<'static, Result<Vec<Show>>>;

  fn get_show(&self, slug: String) -> BoxFuture<'static, Result<ShowDetail>>;

  fn list_courses(&self) -> BoxFuture<'static, Result<Vec<Course>>>;

  fn course_metadata(&self) -> BoxFuture<'static, Result<CourseMetadata>>;

  fn page_content(&self, page: String) -> BoxFuture<'static, Result<PageContent>>;

  fn hero_images(&self) -> BoxFuture<'static, Result<Vec<HeroImage>>>;

  /// Reconcile the course catalogue with the booking system.
  fn sync_courses(&self) -> BoxFuture<'static, Result<SyncReport>>;
}

/// HTTP client for the hosted backend and the CMS.
#[derive(Clone)]
pub struct SiteClient {
  http: reqwest::Client,
  backend: Url,
  cms: Url,
  cms_token: Option<String>,
}

impl SiteClient {
  pub fn new(config: &Config) -> Result<Self> {
    let key = Config::get_backend_key()?;

    let mut headers = HeaderMap::new();
    headers.insert(
      "apikey",
      HeaderValue::from_str(&key).map_err(|e| eyre!("Invalid backend key: {}", e))?,
    );
    headers.insert(
      AUTHORIZATION,
      HeaderValue::from_str(&format!("Bearer {}", key))
        .map_err(|e| eyre!("Invalid backend key: {}", e))?,
    );

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(Duration::from_secs(config.backend.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      backend: base_url(&config.backend.url)?,
      cms: base_url(&config.cms.url)?,
      cms_token: Config::get_cms_token(),
    })
  }

  /// Get all published shows, soonest first
  pub async fn list_shows(&self) -> Result<Vec<Show>> {
    let url = self.table_url("shows", &[("select", "*"), ("order", "opens_on.asc")])?;
    self.get_json(url).await
  }

  /// Get one show with its performances
  pub async fn get_show(&self, slug: &str) -> Result<ShowDetail> {
    let filter = format!("eq.{}", slug);
    let url = self.table_url(
      "shows",
      &[("select", "*,performances(*)"), ("slug", filter.as_str())],
    )?;

    let mut rows: Vec<ShowDetail> = self.get_json(url).await?;
    if rows.is_empty() {
      return Err(eyre!("Show not found: {}", slug));
    }
    Ok(rows.swap_remove(0))
  }

  /// Get the course catalogue, soonest first
  pub async fn list_courses(&self) -> Result<Vec<Course>> {
    let url = self.table_url("courses", &[("select", "*"), ("order", "starts_on.asc")])?;
    self.get_json(url).await
  }

  pub async fn course_metadata(&self) -> Result<CourseMetadata> {
    self.call_rpc("course_metadata").await
  }

  /// Run the course catalogue sync procedure
  pub async fn sync_courses(&self) -> Result<SyncReport> {
    self.call_rpc("sync_course_catalog").await
  }

  /// Get CMS copy for a page
  pub async fn page_content(&self, page: &str) -> Result<PageContent> {
    let url = self
      .cms
      .join(&format!("content/pages/{}", page))
      .map_err(|e| eyre!("Invalid page slug {}: {}", page, e))?;
    self.get_cms_json(url).await
  }

  pub async fn hero_images(&self) -> Result<Vec<HeroImage>> {
    let url = self
      .cms
      .join("content/hero-images")
      .map_err(|e| eyre!("Invalid CMS URL: {}", e))?;
    self.get_cms_json(url).await
  }

  fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Result<Url> {
    let mut url = self
      .backend
      .join(&format!("rest/v1/{}", table))
      .map_err(|e| eyre!("Invalid table name {}: {}", table, e))?;
    url.query_pairs_mut().extend_pairs(query);
    Ok(url)
  }

  async fn call_rpc<T: DeserializeOwned>(&self, function: &str) -> Result<T> {
    let url = self
      .backend
      .join(&format!("rest/v1/rpc/{}", function))
      .map_err(|e| eyre!("Invalid procedure name {}: {}", function, e))?;

    let response = self
      .http
      .post(url)
      .json(&json!({}))
      .send()
      .await
      .map_err(|e| eyre!("Failed to call {}: {}", function, e))?
      .error_for_status()
      .map_err(|e| eyre!("Procedure {} failed: {}", function, e))?;

    response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse {} response: {}", function, e))
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
    let response = self
      .http
      .get(url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to get {}: {}", url.path(), e))?
      .error_for_status()
      .map_err(|e| eyre!("Request for {} failed: {}", url.path(), e))?;

    response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse {}: {}", url.path(), e))
  }

  async fn get_cms_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
    let mut request = self.http.get(url.clone());
    if let Some(token) = &self.cms_token {
      // Replaces the backend bearer set as a default header
      request = request.header(AUTHORIZATION, format!("Bearer {}", token));
    }

    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Failed to get {}: {}", url.path(), e))?
      .error_for_status()
      .map_err(|e| eyre!("CMS request for {} failed: {}", url.path(), e))?;

    let body: Value = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse {}: {}", url.path(), e))?;

    // The CMS wraps payloads in {"data": ...}
    let payload = match body {
      Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or_default(),
      other => other,
    };
    serde_json::from_value(payload).map_err(|e| eyre!("Failed to decode {}: {}", url.path(), e))
  }
}

impl SiteApi for SiteClient {
  fn list_shows(&self) -> BoxFuture<'static, Result<Vec<Show>>> {
    let client = self.clone();
    async move { client.list_shows().await }.boxed()
  }

  fn get_show(&self, slug: String) -> BoxFuture<'static, Result<ShowDetail>> {
    let client = self.clone();
    async move { client.get_show(&slug).await }.boxed()
  }

  fn list_courses(&self) -> BoxFuture<'static, Result<Vec<Course>>> {
    let client = self.clone();
    async move { client.list_courses().await }.boxed()
  }

  fn course_metadata(&self) -> BoxFuture<'static, Result<CourseMetadata>> {
    let client = self.clone();
    async move { client.course_metadata().await }.boxed()
  }

  fn page_content(&self, page: String) -> BoxFuture<'static, Result<PageContent>> {
    let client = self.clone();
    async move { client.page_content(&page).await }.boxed()
  }

  fn hero_images(&self) -> BoxFuture<'static, Result<Vec<HeroImage>>> {
    let client = self.clone();
    async move { client.hero_images().await }.boxed()
  }

  fn sync_courses(&self) -> BoxFuture<'static, Result<SyncReport>> {
    let client = self.clone();
    async move { client.sync_courses().await }.boxed()
  }
}

/// Parse a base URL, making sure relative joins append to its path.
fn base_url(raw: &str) -> Result<Url> {
  let mut url = Url::parse(raw).map_err(|e| eyre!("Invalid URL {}: {}", raw, e))?;
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  Ok(url)
}
