use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// One page of a listing with the totals a client needs to walk the rest.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// A 1-based page number and a page size, both normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(page: Option<usize>, limit: Option<usize>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.limit
    }

    /// Wrap a page the store already cut out of `total` matches.
    pub fn wrap<T>(&self, data: Vec<T>, total: usize) -> Page<T> {
        Page {
            data,
            total,
            page: self.page,
            limit: self.limit,
            total_pages: total.div_ceil(self.limit),
        }
    }

    /// Cut this page out of a fully loaded, already ordered listing.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let data = items.into_iter().skip(self.offset()).take(self.limit).collect();
        self.wrap(data, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_page_and_limit() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, limit: 10 });
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(Some(3), Some(500)).limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn slices_the_requested_page() {
        let page = PageRequest::new(Some(2), Some(3)).slice((1..=7).collect::<Vec<_>>());
        assert_eq!(page.data, vec![4, 5, 6]);
        assert_eq!((page.total, page.total_pages), (7, 3));

        let past_end = PageRequest::new(Some(4), Some(3)).slice((1..=7).collect::<Vec<_>>());
        assert!(past_end.data.is_empty());
        assert_eq!(past_end.total, 7);
    }
}
