//! Pagination helpers shared by the persisted and demo catalogs

use serde::Serialize;

/// Requested page window (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    /// `page` values below 1 are treated as the first page
    pub fn new(page: Option<u32>, per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }

    pub fn last_page(&self, total: u64) -> u64 {
        total.div_ceil(self.per_page as u64)
    }
}

/// One page of results, serialized in the shape the frontend expects
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    #[serde(rename = "data")]
    pub items: Vec<T>,
    pub current_page: u32,
    pub last_page: u64,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: u64) -> Self {
        Self {
            items,
            current_page: pagination.page,
            last_page: pagination.last_page(total),
            per_page: pagination.per_page,
            total,
        }
    }

    /// Slice an already filtered, ordered collection
    pub fn from_vec(all: Vec<T>, pagination: Pagination) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.per_page as usize)
            .collect();
        Self::new(items, pagination, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_page_is_ceiling() {
        let pagination = Pagination::new(None, 9);
        assert_eq!(pagination.last_page(0), 0);
        assert_eq!(pagination.last_page(1), 1);
        assert_eq!(pagination.last_page(9), 1);
        assert_eq!(pagination.last_page(10), 2);
        assert_eq!(pagination.last_page(50), 6);
    }

    #[test]
    fn test_page_below_one_is_first_page() {
        assert_eq!(Pagination::new(Some(0), 9).page, 1);
        assert_eq!(Pagination::new(None, 9).offset(), 0);
        assert_eq!(Pagination::new(Some(3), 9).offset(), 18);
    }

    #[test]
    fn test_out_of_range_page_is_empty() {
        let page = Paginated::from_vec((1..=10).collect::<Vec<_>>(), Pagination::new(Some(5), 9));
        assert!(page.items.is_empty());
        assert_eq!(page.total, 10);
        assert_eq!(page.last_page, 2);
        assert_eq!(page.current_page, 5);
    }

    #[test]
    fn test_last_page_holds_remainder() {
        let page = Paginated::from_vec((1..=10).collect::<Vec<_>>(), Pagination::new(Some(2), 9));
        assert_eq!(page.items, vec![10]);
    }
}
