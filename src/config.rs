use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::query::QueryOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  pub cms: CmsConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub prefetch: PrefetchConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  /// Image URLs to preload when the session starts
  #[serde(default)]
  pub images: Vec<String>,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Base URL of the hosted backend (e.g., "https://abc.example.co")
  pub url: String,
  /// Request timeout for backend and CMS calls
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CmsConfig {
  /// Base URL of the headless CMS content API
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Default staleness window for response cache entries
  pub stale_secs: i64,
  /// Default eviction window for response cache entries
  pub gc_secs: i64,
  /// Time-to-live for durable (on-disk) records
  pub durable_ttl_secs: i64,
  /// Persist durable records to SQLite; in-memory only when false
  pub persist: bool,
  /// Database path (default: $XDG_DATA_HOME/limelight/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: 5 * 60,
      gc_secs: 10 * 60,
      durable_ttl_secs: 5 * 60,
      persist: true,
      path: None,
    }
  }
}

impl CacheConfig {
  pub fn query_options(&self) -> QueryOptions {
    QueryOptions::new(
      Duration::seconds(self.stale_secs),
      Duration::seconds(self.gc_secs),
    )
  }

  pub fn durable_ttl(&self) -> Duration {
    Duration::seconds(self.durable_ttl_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
  /// Staleness window for data prefetched on hover
  pub intent_stale_secs: i64,
  /// Eviction window for data prefetched on hover
  pub intent_gc_secs: i64,
}

impl Default for PrefetchConfig {
  fn default() -> Self {
    Self {
      intent_stale_secs: 30 * 60,
      intent_gc_secs: 60 * 60,
    }
  }
}

impl PrefetchConfig {
  pub fn intent_options(&self) -> QueryOptions {
    QueryOptions::new(
      Duration::seconds(self.intent_stale_secs),
      Duration::seconds(self.intent_gc_secs),
    )
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Delay before the one-shot background prefetch batch
  pub defer_secs: u64,
  /// Period of the background stale-marking batch
  pub period_secs: u64,
  /// Minimum time between two course catalogue syncs
  pub min_interval_secs: i64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      defer_secs: 3,
      period_secs: 5 * 60,
      min_interval_secs: 60 * 60,
    }
  }
}

impl SyncConfig {
  pub fn defer(&self) -> std::time::Duration {
    std::time::Duration::from_secs(self.defer_secs)
  }

  pub fn period(&self) -> std::time::Duration {
    std::time::Duration::from_secs(self.period_secs)
  }

  pub fn min_interval(&self) -> Duration {
    Duration::seconds(self.min_interval_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Default filter directive; RUST_LOG overrides it
  pub level: String,
  /// Directory for log files (default: $XDG_DATA_HOME/limelight/logs)
  pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      dir: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./limelight.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/limelight/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/limelight/config.yaml\n\
                 It needs at least backend.url and cms.url."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("limelight.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("limelight").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("{} ({})", e, path.display()))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Self =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config file: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  /// Reject windows and periods the caches and timers cannot run with.
  fn validate(&self) -> Result<()> {
    let windows = [
      ("cache.stale_secs", self.cache.stale_secs),
      ("cache.gc_secs", self.cache.gc_secs),
      ("cache.durable_ttl_secs", self.cache.durable_ttl_secs),
      ("prefetch.intent_stale_secs", self.prefetch.intent_stale_secs),
      ("prefetch.intent_gc_secs", self.prefetch.intent_gc_secs),
      ("sync.min_interval_secs", self.sync.min_interval_secs),
    ];
    if let Some((name, secs)) = windows.iter().find(|(_, secs)| *secs < 0) {
      return Err(eyre!("Invalid config: {} must not be negative (got {})", name, secs));
    }

    if self.sync.period_secs == 0 {
      return Err(eyre!("Invalid config: sync.period_secs must be greater than zero"));
    }
    if self.backend.timeout_secs == 0 {
      return Err(eyre!("Invalid config: backend.timeout_secs must be greater than zero"));
    }
    Ok(())
  }

  /// Get the backend API key from environment variables.
  ///
  /// Checks LIMELIGHT_BACKEND_KEY first, then BACKEND_ANON_KEY as fallback.
  pub fn get_backend_key() -> Result<String> {
    std::env::var("LIMELIGHT_BACKEND_KEY")
      .or_else(|_| std::env::var("BACKEND_ANON_KEY"))
      .map_err(|_| {
        eyre!(
          "Backend API key not found. Set LIMELIGHT_BACKEND_KEY or BACKEND_ANON_KEY environment variable."
        )
      })
  }

  /// Get the CMS access token, if one is set in LIMELIGHT_CMS_TOKEN.
  ///
  /// Public CMS spaces are readable without one.
  pub fn get_cms_token() -> Option<String> {
    std::env::var("LIMELIGHT_CMS_TOKEN").ok()
  }
}
