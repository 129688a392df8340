//! This module defines the common functionality for paging data.

use serde::Serialize;

/// The config that controls how list endpoints page their data.
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of items per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a request may ask for.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl PaginationConfig {
    /// Resolve the requested page and page size against the config's
    /// defaults and limits.
    ///
    /// A missing or zero page becomes the default page, and the page size is
    /// clamped to `max_page_size`.
    pub fn resolve(&self, page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
        let page = match page {
            Some(page) if page > 0 => page,
            _ => self.default_page,
        };

        let page_size = match limit {
            Some(limit) if limit > 0 => limit.min(self.max_page_size),
            _ => self.default_page_size,
        };

        (page, page_size)
    }
}

/// The pagination metadata returned alongside a page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// The 1-based page number of the returned page.
    pub current_page: u64,
    /// The total number of pages available.
    pub total_pages: u64,
    /// The total number of items matching the query.
    pub total_items: u64,
    /// The number of items per page.
    pub items_per_page: u64,
}

impl Pagination {
    /// Build pagination metadata for a result set of `total_items` paged by
    /// `items_per_page`.
    pub fn new(current_page: u64, total_items: u64, items_per_page: u64) -> Self {
        let total_pages = total_items.div_ceil(items_per_page.max(1));

        Self {
            current_page,
            total_pages,
            total_items,
            items_per_page,
        }
    }
}
