//! Image preloading with request coalescing.

use color_eyre::{eyre::eyre, Result};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use reqwest::header::CONTENT_TYPE;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Loads one image resource to completion.
pub trait ImageLoader: Send + Sync + 'static {
  fn load(&self, url: String) -> BoxFuture<'static, Result<()>>;
}

/// Loads images over HTTP.
///
/// A load succeeds when the server answers 2xx with an image (or untyped)
/// body and the whole body can be read.
#[derive(Clone)]
pub struct HttpImageLoader {
  http: reqwest::Client,
}

impl HttpImageLoader {
  pub fn new(timeout: Duration) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create image client: {}", e))?;
    Ok(Self { http })
  }
}

impl ImageLoader for HttpImageLoader {
  fn load(&self, url: String) -> BoxFuture<'static, Result<()>> {
    let http = self.http.clone();
    async move {
      let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| eyre!("Failed to load image {}: {}", url, e))?
        .error_for_status()
        .map_err(|e| eyre!("Image {} unavailable: {}", url, e))?;

      if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
        let content_type = content_type.to_str().unwrap_or_default();
        if !content_type.starts_with("image/") {
          return Err(eyre!("{} is not an image ({})", url, content_type));
        }
      }

      response
        .bytes()
        .await
        .map_err(|e| eyre!("Failed to read image {}: {}", url, e))?;
      Ok(())
    }
    .boxed()
  }
}

type PendingLoad = Shared<BoxFuture<'static, bool>>;

#[derive(Default)]
struct Records {
  /// Bumped by `clear()` so loads started earlier are not recorded
  generation: u64,
  loaded: HashSet<String>,
  pending: HashMap<String, PendingLoad>,
}

/// Tracks which image URLs have been preloaded.
///
/// Concurrent preloads of one URL share a single load. Successful loads are
/// remembered for the rest of the session; failed loads are forgotten so the
/// next preload retries from scratch.
#[derive(Clone)]
pub struct ImagePreloadCache {
  loader: Arc<dyn ImageLoader>,
  records: Arc<Mutex<Records>>,
}

impl ImagePreloadCache {
  pub fn new(loader: Arc<dyn ImageLoader>) -> Self {
    Self {
      loader,
      records: Arc::new(Mutex::new(Records::default())),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Records> {
    self.records.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Load `url`, resolving to whether it loaded.
  ///
  /// Callers may stop waiting at any time; the load itself is never aborted.
  pub async fn preload(&self, url: &str) -> bool {
    let pending = {
      let mut records = self.lock();
      if records.loaded.contains(url) {
        return true;
      }
      match records.pending.get(url) {
        Some(pending) => pending.clone(),
        None => self.start_load(&mut records, url),
      }
    };

    pending.await
  }

  /// Preload every URL, keeping the input order in the result.
  ///
  /// Waits for all loads to settle; one failure does not cut the others short.
  pub async fn preload_all<S: AsRef<str>>(&self, urls: &[S]) -> Vec<bool> {
    join_all(urls.iter().map(|url| self.preload(url.as_ref()))).await
  }

  pub fn is_loaded(&self, url: &str) -> bool {
    self.lock().loaded.contains(url)
  }

  /// Forget every pending and loaded URL. Loads already running keep running
  /// but their results are dropped.
  pub fn clear(&self) {
    let mut records = self.lock();
    records.generation += 1;
    records.loaded.clear();
    records.pending.clear();
  }

  pub fn len(&self) -> usize {
    self.lock().loaded.len()
  }

  pub fn pending_count(&self) -> usize {
    self.lock().pending.len()
  }

  fn start_load(&self, records: &mut Records, url: &str) -> PendingLoad {
    let loader = Arc::clone(&self.loader);
    let mut settle = SettleLoad {
      records: Arc::clone(&self.records),
      url: url.to_string(),
      generation: records.generation,
      loaded: false,
    };

    let task = tokio::spawn(async move {
      settle.loaded = match loader.load(settle.url.clone()).await {
        Ok(()) => true,
        Err(e) => {
          debug!(url = %settle.url, error = %e, "image preload failed");
          false
        }
      };
      settle.loaded
    });

    let pending = async move { task.await.unwrap_or(false) }.boxed().shared();
    records.pending.insert(url.to_string(), pending.clone());
    pending
  }
}

/// Records the outcome of one load when its task ends, including a panicking load.
struct SettleLoad {
  records: Arc<Mutex<Records>>,
  url: String,
  generation: u64,
  loaded: bool,
}

impl Drop for SettleLoad {
  fn drop(&mut self) {
    let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
    if records.generation != self.generation {
      return;
    }
    records.pending.remove(&self.url);
    if self.loaded {
      records.loaded.insert(std::mem::take(&mut self.url));
    }
  }
}
