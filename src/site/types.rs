use serde::{Deserialize, Serialize};

/// Show summary for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
  pub id: i64,
  pub slug: String,
  pub title: String,
  #[serde(default)]
  pub venue: Option<String>,
  #[serde(default)]
  pub opens_on: Option<String>,
  #[serde(default)]
  pub hero_image: Option<String>,
}

/// Full show page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowDetail {
  pub id: i64,
  pub slug: String,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub venue: Option<String>,
  #[serde(default)]
  pub performances: Vec<Performance>,
  #[serde(default)]
  pub gallery: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
  pub starts_at: String,
  #[serde(default)]
  pub tickets_remaining: Option<u32>,
}

/// Course in the catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
  pub id: i64,
  pub slug: String,
  pub title: String,
  #[serde(default)]
  pub level: Option<String>,
  #[serde(default)]
  pub starts_on: Option<String>,
  #[serde(default)]
  pub spaces_left: Option<u32>,
}

/// Catalogue-wide course facts, cached locally across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseMetadata {
  #[serde(default)]
  pub levels: Vec<String>,
  #[serde(default)]
  pub age_groups: Vec<String>,
  #[serde(default)]
  pub terms: Vec<String>,
}

/// Copy block for one page, from the CMS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
  pub slug: String,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroImage {
  pub url: String,
  #[serde(default)]
  pub alt: Option<String>,
  #[serde(default)]
  pub page: Option<String>,
}

/// Result of the course catalogue sync procedure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
  #[serde(default)]
  pub inserted: u32,
  #[serde(default)]
  pub updated: u32,
  #[serde(default)]
  pub removed: u32,
}
