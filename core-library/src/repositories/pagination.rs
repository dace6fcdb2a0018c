//! Offset pagination for local listings

use serde::{Deserialize, Serialize};

/// Which slice of a listing to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page number
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// ```
    /// use core_library::repositories::PageRequest;
    ///
    /// let request = PageRequest::new(2, 25);
    /// assert_eq!(request.offset(), 50);
    /// ```
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: 100,
        }
    }
}

/// One slice of a listing plus the size of the whole listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) + 1 < self.total_pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        let page = Page::new(vec![1, 2, 3], 25, PageRequest::new(0, 10));
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());

        let last = Page::new(vec![21, 22, 23, 24, 25], 25, PageRequest::new(2, 10));
        assert!(!last.has_next());
    }

    #[test]
    fn test_zero_page_size_has_no_pages() {
        let page: Page<i32> = Page::new(Vec::new(), 10, PageRequest::new(0, 0));
        assert_eq!(page.total_pages(), 0);
        assert!(!page.has_next());
    }
}
