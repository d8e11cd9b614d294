//! # Pagination
//!
//! Turns (item count, requested page, page size) into an offset/limit window
//! plus navigation flags.

use serde::Serialize;
use std::fmt;

/// Page size used by the list endpoints when none is given
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// One page of a listing
///
/// `page_index` is always within `1..=max(page_count, 1)`. A request past
/// the last page, or against an empty listing, collapses to page 1 with an
/// empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    /// Total number of items
    pub item_count: u64,
    /// Items per page
    pub page_size: u64,
    /// Current page, 1-based
    pub page_index: u64,
    /// Number of pages
    pub page_count: u64,
    /// Index of the first item on this page
    pub offset: u64,
    /// Number of items to fetch for this page
    pub limit: u64,
    /// A later page exists
    pub has_next: bool,
    /// An earlier page exists
    pub has_previous: bool,
}

impl Page {
    /// Compute the page window.
    ///
    /// `page_size` of 0 is treated as 1 and `page_index` of 0 as 1.
    #[must_use]
    pub fn new(item_count: u64, page_index: u64, page_size: u64) -> Self {
        let page_size = page_size.max(1);
        let requested = page_index.max(1);
        let page_count = item_count.div_ceil(page_size);

        let (page_index, offset, limit) = if item_count == 0 || requested > page_count {
            (1, 0, 0)
        } else {
            (requested, page_size * (requested - 1), page_size)
        };

        Self {
            item_count,
            page_size,
            page_index,
            page_count,
            offset,
            limit,
            has_next: page_index < page_count,
            has_previous: page_index > 1,
        }
    }

    /// Page with the default size
    #[must_use]
    pub fn with_default_size(item_count: u64, page_index: u64) -> Self {
        Self::new(item_count, page_index, DEFAULT_PAGE_SIZE)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "item_count: {}, page_count: {}, page_index: {}, page_size: {}, offset: {}, limit: {}",
            self.item_count, self.page_count, self.page_index, self.page_size, self.offset, self.limit
        )
    }
}

/// Normalize textual page input: missing, non-numeric or < 1 becomes 1
#[must_use]
pub fn page_index(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|&p| p >= 1)
        .and_then(|p| u64::try_from(p).ok())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_page() {
        let page = Page::new(25, 3, 10);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.page_index, 3);
        assert_eq!(page.offset, 20);
        assert_eq!(page.limit, 10);
        assert!(!page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn test_empty_listing() {
        let page = Page::new(0, 5, 10);
        assert_eq!(page.page_index, 1);
        assert_eq!(page.page_count, 0);
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, 0);
        assert!(!page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn test_past_last_page_clamps() {
        let page = Page::new(15, 7, 10);
        assert_eq!(page.page_index, 1);
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, 0);
        assert!(page.has_next);
    }

    #[test]
    fn test_first_page() {
        let page = Page::with_default_size(11, 1);
        assert_eq!(page.page_count, 2);
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, 10);
        assert!(page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn test_window_never_exceeds_items() {
        for items in 0..40u64 {
            for size in 1..12u64 {
                for index in 0..8u64 {
                    let page = Page::new(items, index, size);
                    assert!(page.page_index >= 1);
                    assert!(page.page_index <= page.page_count.max(1));
                    if page.limit > 0 {
                        assert!(page.offset < items);
                        // the final page may be partially filled
                        assert!(page.offset + page.limit <= items + size - 1);
                        assert!(page.offset + page.limit <= page.page_count * size);
                    }
                }
            }
        }
    }

    #[test]
    fn test_page_index_normalization() {
        assert_eq!(page_index(Some("3")), 3);
        assert_eq!(page_index(Some("abc")), 1);
        assert_eq!(page_index(Some("0")), 1);
        assert_eq!(page_index(Some("-4")), 1);
        assert_eq!(page_index(None), 1);
    }

    #[test]
    fn test_display() {
        let text = Page::new(25, 2, 10).to_string();
        assert!(text.contains("page_index: 2"));
        assert!(text.contains("offset: 10"));
    }
}
