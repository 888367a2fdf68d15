//! Page/offset arithmetic for list queries.

use serde::{Deserialize, Serialize};

/// Largest page size accepted from request parameters.
pub const MAX_PER_PAGE: u64 = 1000;

/// Page-based pagination (1-indexed pages).
///
/// No range checks beyond saturating arithmetic: page 0 behaves like page 1
/// and a zero page size yields an empty page. Values past `i64::MAX` are
/// clamped when rendered into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page number (1-indexed).
    #[serde(default = "default_page")]
    pub page: u64,

    /// Items per page.
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Pagination {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    /// Parse from request parameters, falling back to defaults on bad input.
    ///
    /// The page size is capped at [`MAX_PER_PAGE`].
    pub fn from_params(page: Option<&str>, per_page: Option<&str>) -> Self {
        let page = page
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or_else(default_page);
        let per_page = per_page
            .and_then(|p| p.trim().parse::<u64>().ok())
            .unwrap_or_else(default_per_page)
            .min(MAX_PER_PAGE);
        Self { page, per_page }
    }

    /// Get the offset for SQL queries.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    /// Get the limit for SQL queries.
    pub fn limit(&self) -> u64 {
        self.per_page
    }

    /// Number of pages needed for `total` rows.
    pub fn last_page(&self, total: u64) -> u64 {
        if self.per_page == 0 {
            0
        } else {
            total.div_ceil(self.per_page)
        }
    }
}

/// A page of rows plus the total row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub last_page: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, pagination: &Pagination, total: u64) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            last_page: pagination.last_page(total),
        }
    }

    /// Map items to a different type.
    pub fn map<U, F>(self, f: F) -> Paginated<U>
    where
        F: FnMut(T) -> U,
    {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        assert_eq!(Pagination::new(1, 20).offset(), 0);
        assert_eq!(Pagination::new(3, 10).offset(), 20);
        assert_eq!(Pagination::new(0, 10).offset(), 0);
        assert_eq!(Pagination::new(u64::MAX, u64::MAX).offset(), u64::MAX);
    }

    #[test]
    fn test_last_page() {
        let p = Pagination::new(1, 10);
        assert_eq!(p.last_page(0), 0);
        assert_eq!(p.last_page(10), 1);
        assert_eq!(p.last_page(21), 3);
        assert_eq!(Pagination::new(1, 0).last_page(5), 0);
    }

    #[test]
    fn test_from_params() {
        assert_eq!(
            Pagination::from_params(Some("2"), Some("50")),
            Pagination::new(2, 50)
        );
        assert_eq!(
            Pagination::from_params(Some("abc"), None),
            Pagination::default()
        );
    }

    #[test]
    fn test_from_params_caps_page_size() {
        let p = Pagination::from_params(Some("18446744073709551615"), Some("18446744073709551615"));
        assert_eq!(p.page, u64::MAX);
        assert_eq!(p.per_page, MAX_PER_PAGE);
        assert_eq!(p.offset(), u64::MAX);
    }

    #[test]
    fn test_paginated_map() {
        let page = Paginated::new(vec![1, 2], &Pagination::new(1, 2), 5).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.last_page, 3);
    }
}
