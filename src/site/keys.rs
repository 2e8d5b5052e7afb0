//! Query keys for site data.

use crate::query::QueryKey;

/// Query key types for site reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SiteQueryKey {
  /// Show listing
  Shows,
  /// A single show page
  ShowDetail { slug: String },
  /// Course catalogue
  Courses,
  /// Catalogue-wide course facts (levels, terms)
  CourseMetadata,
  /// CMS copy for one page
  PageContent { page: String },
  /// Hero images for all pages
  HeroImages,
}

impl SiteQueryKey {
  pub fn show_detail(slug: &str) -> Self {
    Self::ShowDetail {
      slug: normalize_slug(slug),
    }
  }

  pub fn page_content(page: &str) -> Self {
    Self::PageContent {
      page: normalize_slug(page),
    }
  }

  /// The same key with its slug in canonical form, as requested from the site.
  pub fn normalized(self) -> Self {
    match self {
      Self::ShowDetail { slug } => Self::show_detail(&slug),
      Self::PageContent { page } => Self::page_content(&page),
      other => other,
    }
  }

  pub fn query_key(&self) -> QueryKey {
    match self {
      Self::Shows => QueryKey::new(["shows"]),
      Self::ShowDetail { slug } => QueryKey::new(["show"]).with(normalize_slug(slug)),
      Self::Courses => QueryKey::new(["courses"]),
      Self::CourseMetadata => QueryKey::new(["course-metadata"]),
      Self::PageContent { page } => QueryKey::new(["page-content"]).with(normalize_slug(page)),
      Self::HeroImages => QueryKey::new(["hero-images"]),
    }
  }

  pub fn description(&self) -> String {
    match self {
      Self::Shows => "all shows".to_string(),
      Self::ShowDetail { slug } => format!("show {}", slug),
      Self::Courses => "course catalogue".to_string(),
      Self::CourseMetadata => "course metadata".to_string(),
      Self::PageContent { page } => format!("page content for {}", page),
      Self::HeroImages => "hero images".to_string(),
    }
  }
}

/// Normalize a slug for consistent keys.
/// Trims whitespace and slashes and lowercases, so "/About/" and "about" share an entry.
fn normalize_slug(slug: &str) -> String {
  slug.trim().trim_matches('/').to_lowercase()
}
