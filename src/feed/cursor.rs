/// Where the feed's pagination stands, as shown to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingState {
    /// More pages may be fetched by scrolling.
    More,
    /// The last server page has been loaded.
    EndReached,
    /// The hard page cap was hit before the end was known.
    LimitReached,
}

/// Pagination progress of the visible feed.
///
/// Invariant: `current_page <= max(total_pages, 1)` and
/// `current_page <= max_allowed_page`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationCursor {
    current_page: u32,
    total_pages: u32,
    max_allowed_page: u32,
    loaded: bool,
}

impl PaginationCursor {
    pub fn new(max_allowed_page: u32) -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            max_allowed_page: max_allowed_page.max(1),
            loaded: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.max_allowed_page);
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn max_allowed_page(&self) -> u32 {
        self.max_allowed_page
    }

    /// Whether at least one page response has been applied since the last reset.
    pub fn has_loaded(&self) -> bool {
        self.loaded
    }

    pub fn next_page(&self) -> u32 {
        self.current_page.saturating_add(1)
    }

    /// Pages outside `1..=max_allowed_page` are never fetched.
    pub fn allows(&self, page: u32) -> bool {
        (1..=self.max_allowed_page).contains(&page)
    }

    /// Apply the page number and page count reported by a page response.
    pub fn record_page(&mut self, page: u32, total_pages: u32) {
        self.total_pages = total_pages;
        self.current_page = page
            .clamp(1, total_pages.max(1))
            .min(self.max_allowed_page);
        self.loaded = true;
    }

    /// Apply a page count learned out of band (background poll) without
    /// rewinding scroll progress. A shrinking total is floored at the current
    /// page, which marks the end as reached.
    pub fn update_total(&mut self, total_pages: u32) {
        self.total_pages = total_pages.max(self.current_page);
    }

    pub fn paging_state(&self) -> PagingState {
        if self.loaded && self.current_page >= self.total_pages {
            PagingState::EndReached
        } else if self.current_page >= self.max_allowed_page {
            PagingState::LimitReached
        } else {
            PagingState::More
        }
    }
}
