//! Pagination utilities for list endpoints

use serde::{Deserialize, Serialize};

/// Pagination query parameters
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PaginationParams {
    /// Page number (1-indexed)
    pub page: Option<u32>,

    /// Items per page
    pub limit: Option<u32>,
}

impl PaginationParams {
    /// Maximum allowed items per page
    pub const MAX_LIMIT: u32 = 100;

    /// Returns the clamped limit value (default 10)
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(10).min(Self::MAX_LIMIT).max(1)
    }

    /// Returns the page (1-indexed, minimum 1)
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Calculate SQL OFFSET
    pub fn offset(&self) -> u32 {
        (self.page() - 1) * self.limit()
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u32,
}

impl PaginationMeta {
    pub fn new(params: &PaginationParams, total: u64) -> Self {
        let limit = params.limit();
        let pages = ((total as f64) / (limit as f64)).ceil() as u32;

        Self {
            page: params.page(),
            limit,
            total,
            pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page_of_ten() {
        let params = PaginationParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 10);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let params = PaginationParams {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), PaginationParams::MAX_LIMIT);

        let params = PaginationParams {
            page: Some(3),
            limit: Some(0),
        };
        assert_eq!(params.limit(), 1);
        assert_eq!(params.offset(), 2);
    }

    #[test]
    fn meta_rounds_page_count_up() {
        let params = PaginationParams {
            page: Some(1),
            limit: Some(10),
        };
        let meta = PaginationMeta::new(&params, 25);
        assert_eq!(meta.pages, 3);
        assert_eq!(meta.total, 25);

        let meta = PaginationMeta::new(&params, 0);
        assert_eq!(meta.pages, 0);
    }
}
