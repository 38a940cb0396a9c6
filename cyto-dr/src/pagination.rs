//! Page arithmetic shared by the table and frequency endpoints

use serde::Serialize;

/// Rows per page for every paginated endpoint
pub const PAGE_SIZE: i64 = 100;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET or slicing
    pub offset: i64,
}

/// Calculate pagination metadata from total results and requested page
///
/// The page is clamped into [1, total_pages].
///
/// # Examples
/// ```
/// use cyto_dr::pagination::calculate_pagination;
///
/// // 250 total results = 3 pages (100 + 100 + 50)
/// let p = calculate_pagination(250, 2);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 100);
///
/// let p = calculate_pagination(250, 99);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 200);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64) -> Pagination {
    let total_pages = (total_results + PAGE_SIZE - 1) / PAGE_SIZE;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * PAGE_SIZE;

    Pagination {
        page,
        total_pages,
        offset,
    }
}

/// One page of in-memory rows
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub total_rows: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub rows: Vec<T>,
}

impl<T> Page<T> {
    /// Cut the requested page out of `items`
    pub fn from_vec(mut items: Vec<T>, requested_page: i64) -> Self {
        let total_rows = items.len() as i64;
        let p = calculate_pagination(total_rows, requested_page);

        let start = (p.offset as usize).min(items.len());
        let end = (start + PAGE_SIZE as usize).min(items.len());
        let rows: Vec<T> = items.drain(start..end).collect();

        Page {
            total_rows,
            page: p.page,
            page_size: PAGE_SIZE,
            total_pages: p.total_pages,
            rows,
        }
    }
}
