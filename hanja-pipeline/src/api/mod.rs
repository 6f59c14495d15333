//! HTTP read API
//!
//! Thin handlers over the [`crate::db`] query functions. Lookups by
//! character record usage.

pub mod entries;
pub mod health;
pub mod review;

pub use entries::entry_routes;
pub use health::health_routes;
pub use review::review_routes;

use crate::db::Page;
use serde::Deserialize;

/// `?page=&per_page=` query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn page(&self) -> Page {
        Page::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(Page::DEFAULT_PER_PAGE),
        )
    }
}
