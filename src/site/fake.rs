//! In-process stand-in for the remote site, for tests.

use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::client::SiteApi;
use super::types::{
  Course, CourseMetadata, HeroImage, PageContent, Performance, Show, ShowDetail, SyncReport,
};

/// Canned site data with per-method call counters and switchable failures.
#[derive(Default)]
pub struct FakeSite {
  calls: Mutex<HashMap<&'static str, usize>>,
  failing: Mutex<HashSet<&'static str>>,
  delay: Option<Duration>,
}

impl FakeSite {
  pub fn new() -> Self {
    Self::default()
  }

  /// Delay every response, so tests can overlap calls.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn calls(&self, method: &str) -> usize {
    self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
  }

  pub fn fail(&self, method: &'static str) {
    self.failing.lock().unwrap().insert(method);
  }

  pub fn recover(&self, method: &'static str) {
    self.failing.lock().unwrap().remove(method);
  }

  fn respond<T: Send + 'static>(&self, method: &'static str, value: T) -> BoxFuture<'static, Result<T>> {
    *self.calls.lock().unwrap().entry(method).or_default() += 1;
    let failing = self.failing.lock().unwrap().contains(method);
    let delay = self.delay;

    async move {
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      if failing {
        return Err(eyre!("fake {} failure", method));
      }
      Ok(value)
    }
    .boxed()
  }
}

impl SiteApi for FakeSite {
  fn list_shows(&self) -> BoxFuture<'static, Result<Vec<Show>>> {
    let shows = vec![Show {
      id: 1,
      slug: "hamlet".to_string(),
      title: "Hamlet".to_string(),
      venue: Some("Main House".to_string()),
      opens_on: Some("2026-11-02".to_string()),
      hero_image: None,
    }];
    self.respond("list_shows", shows)
  }

  fn get_show(&self, slug: String) -> BoxFuture<'static, Result<ShowDetail>> {
    let mut chars = slug.chars();
    let title = match chars.next() {
      Some(first) => first.to_uppercase().chain(chars).collect(),
      None => String::new(),
    };
    let show = ShowDetail {
      id: 1,
      slug,
      title,
      description: None,
      venue: None,
      performances: vec![Performance {
        starts_at: "2026-11-02T19:30:00Z".to_string(),
        tickets_remaining: Some(40),
      }],
      gallery: Vec::new(),
    };
    self.respond("get_show", show)
  }

  fn list_courses(&self) -> BoxFuture<'static, Result<Vec<Course>>> {
    let courses = vec![Course {
      id: 7,
      slug: "youth-theatre".to_string(),
      title: "Youth Theatre".to_string(),
      level: Some("beginner".to_string()),
      starts_on: None,
      spaces_left: Some(12),
    }];
    self.respond("list_courses", courses)
  }

  fn course_metadata(&self) -> BoxFuture<'static, Result<CourseMetadata>> {
    let metadata = CourseMetadata {
      levels: vec!["beginner".to_string(), "advanced".to_string()],
      age_groups: vec!["8-12".to_string()],
      terms: vec!["autumn".to_string()],
    };
    self.respond("course_metadata", metadata)
  }

  fn page_content(&self, page: String) -> BoxFuture<'static, Result<PageContent>> {
    let content = PageContent {
      slug: page,
      title: None,
      body: "Welcome".to_string(),
    };
    self.respond("page_content", content)
  }

  fn hero_images(&self) -> BoxFuture<'static, Result<Vec<HeroImage>>> {
    let images = vec![HeroImage {
      url: "https://cms.example.org/hero/home.jpg".to_string(),
      alt: None,
      page: Some("home".to_string()),
    }];
    self.respond("hero_images", images)
  }

  fn sync_courses(&self) -> BoxFuture<'static, Result<SyncReport>> {
    let report = SyncReport {
      inserted: 1,
      updated: 2,
      removed: 0,
    };
    self.respond("sync_courses", report)
  }
}
