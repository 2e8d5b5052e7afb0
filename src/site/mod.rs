//! Remote site data: the hosted backend (shows, courses, procedures) and the CMS
//! (page copy, hero images).

mod cached_client;
mod client;
mod keys;
mod sync;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use cached_client::CachedSiteClient;
pub use client::{SiteApi, SiteClient};
pub use keys::SiteQueryKey;
pub use sync::CourseCatalogSync;
