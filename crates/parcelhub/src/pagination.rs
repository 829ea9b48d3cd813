use serde::Serialize;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// Offset pagination parameters, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Clamp raw query values: page 0 becomes 1, limit is bounded to `1..=MAX_LIMIT`.
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        ((self.page - 1).saturating_mul(self.limit)) as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl PageInfo {
    pub fn new(request: PageRequest, total: u64) -> Self {
        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_pages: total.div_ceil(request.limit),
        }
    }
}

/// One page of rows plus the totals needed to render pagination controls.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Paginated<T> {
    /// Cut a page out of an already filtered and ordered result set.
    pub fn from_sorted(rows: Vec<T>, request: PageRequest) -> Self {
        let total = rows.len() as u64;
        let data = rows
            .into_iter()
            .skip(request.offset())
            .take(request.limit as usize)
            .collect();

        Self {
            data,
            pagination: PageInfo::new(request, total),
        }
    }

    pub fn map<U, F>(self, f: F) -> Paginated<U>
    where
        F: FnMut(T) -> U,
    {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps_out_of_range_values() {
        let request = PageRequest::new(Some(0), Some(10_000));
        assert_eq!(request.page, 1);
        assert_eq!(request.limit, MAX_LIMIT);

        let request = PageRequest::new(None, Some(0));
        assert_eq!(request.limit, 1);
    }

    #[test]
    fn from_sorted_slices_requested_page_and_counts_pages() {
        let rows: Vec<u32> = (1..=23).collect();
        let page = Paginated::from_sorted(rows, PageRequest::new(Some(3), Some(10)));

        assert_eq!(page.data, vec![21, 22, 23]);
        assert_eq!(page.pagination.total, 23);
        assert_eq!(page.pagination.total_pages, 3);
    }

    #[test]
    fn empty_result_has_zero_pages() {
        let page = Paginated::<u32>::from_sorted(Vec::new(), PageRequest::default());
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total_pages, 0);
    }
}
