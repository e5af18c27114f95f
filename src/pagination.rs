// Page cursor and accumulated results for one filter session.
//
// Pages are appended strictly in order: a page is accepted only when its
// number is exactly one past the last accepted page, whatever order the
// network delivers them in.

use tracing::{debug, warn};

use crate::models::{Listing, ListingPage};

#[derive(Debug, Clone, Default)]
pub struct PaginationController {
    pages: Vec<ListingPage>,
    // Number of the last accepted page, 0 before the first one
    cursor: u32,
    total_count: u64,
    total_pages: u32,
    loading: bool,
}

impl PaginationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all accumulated pages; the next accepted page is page 1.
    pub fn reset(&mut self) {
        self.pages.clear();
        self.cursor = 0;
        self.total_count = 0;
        self.total_pages = 0;
        self.loading = false;
    }

    /// Marks page 1 as in flight after a reset.
    pub fn expect_first_page(&mut self) {
        self.loading = true;
    }

    /// Claims the next page for fetching. Returns `None` while a fetch is
    /// already pending or when there is nothing more to load.
    pub fn begin_load_more(&mut self) -> Option<u32> {
        if self.loading || !self.has_more() {
            return None;
        }
        self.loading = true;
        Some(self.cursor + 1)
    }

    pub fn append_page(&mut self, page: ListingPage) -> bool {
        if page.page_number != self.cursor + 1 {
            warn!(
                expected = self.cursor + 1,
                received = page.page_number,
                "Rejecting out-of-order page"
            );
            return false;
        }
        debug!(page = page.page_number, items = page.items.len(), "Appending page");
        self.cursor = page.page_number;
        self.total_count = page.total_count;
        self.total_pages = page.total_pages;
        self.loading = false;
        self.pages.push(page);
        true
    }

    /// Releases the in-flight claim so the same page can be requested again.
    pub fn fail_load_more(&mut self) {
        self.loading = false;
    }

    pub fn has_more(&self) -> bool {
        self.cursor < self.total_pages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn current_page(&self) -> u32 {
        self.cursor
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn items(&self) -> impl Iterator<Item = &Listing> {
        self.pages.iter().flat_map(|p| p.items.iter())
    }
}
