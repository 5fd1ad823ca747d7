//! Video catalog: filter state, query composition, pagination and lookups.

mod catalog;
mod loader;
pub mod parsing;

use std::collections::BTreeSet;

use tracing::{debug, error};

use crate::store::VideoStore;
use crate::store::query::{Direction, Filter, Query};
use crate::store::types::{Rows, VideoRecord};

pub use catalog::{FilterOptions, normalize_title};
pub use loader::PageLoader;

/// Records per page.
pub const PAGE_SIZE: usize = 20;

pub(crate) const TITLE: &str = "videotitle";
pub(crate) const DESCRIPTION: &str = "description";
pub(crate) const CATEGORY: &str = "category";
pub(crate) const LANGUAGE: &str = "language";
pub(crate) const TAGS: &str = "yt_tags";

/// The user's current search, filter and page selection.
///
/// Every setter that changes what matches also sends the page back to 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    text: String,
    categories: BTreeSet<String>,
    language: String,
    page: usize,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            text: String::new(),
            categories: BTreeSet::new(),
            language: String::new(),
            page: 1,
        }
    }
}

impl FilterState {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.trim().to_string();
        self.page = 1;
    }

    /// Select the category if unselected, else unselect it.
    pub fn toggle_category(&mut self, category: &str) {
        let category = category.trim();
        if category.is_empty() {
            return;
        }
        if !self.categories.remove(category) {
            self.categories.insert(category.to_string());
        }
        self.page = 1;
    }

    pub fn set_categories<I, S>(&mut self, categories: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.categories = categories
            .into_iter()
            .map(|c| c.as_ref().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        self.page = 1;
    }

    /// Empty string means any language.
    pub fn set_language(&mut self, language: &str) {
        self.language = language.trim().to_string();
        self.page = 1;
    }

    /// Pages are 1-based; 0 is treated as 1.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn next_page(&mut self, total_count: usize) {
        self.page = self.page.saturating_add(1).min(total_pages(total_count));
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether no filter group is active.
    pub fn is_unfiltered(&self) -> bool {
        self.text.is_empty() && self.categories.is_empty() && self.language.is_empty()
    }
}

/// One page of matches plus the match count ignoring pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPage {
    pub items: Vec<VideoRecord>,
    pub total_count: usize,
}

/// Number of pages needed for `total_count` matches; never less than 1.
pub fn total_pages(total_count: usize) -> usize {
    total_count.div_ceil(PAGE_SIZE).max(1)
}

/// Build the paged, counted select for `filter`.
///
/// Text matches title, description or tags. Categories are OR-ed against the
/// category line. Language is a substring match. Active groups are AND-ed.
pub fn compose_query(table: &str, filter: &FilterState, page_size: usize) -> Query {
    let mut query = Query::select(table, "*").exact_count();

    if !filter.text.is_empty() {
        query = query.any_of(vec![
            Filter::contains(TITLE, &filter.text),
            Filter::contains(DESCRIPTION, &filter.text),
            Filter::contains(TAGS, &filter.text),
        ]);
    }

    query = query.any_of(
        filter
            .categories
            .iter()
            .map(|c| Filter::contains(CATEGORY, c))
            .collect(),
    );

    if !filter.language.is_empty() {
        query = query.filter(Filter::contains(LANGUAGE, &filter.language));
    }

    let page_size = page_size.max(1);
    let from = (filter.page.max(1) - 1).saturating_mul(page_size);
    query
        .order(TITLE, Direction::Asc)
        .range(from, from.saturating_add(page_size - 1))
}

/// Read access to the videos table.
pub struct Catalog<S> {
    store: S,
    table: String,
    page_size: usize,
}

impl<S: VideoStore> Catalog<S> {
    pub fn new(store: S, table: &str) -> Self {
        Self {
            store,
            table: table.to_string(),
            page_size: PAGE_SIZE,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch the page `filter` selects. Store failures are logged and yield an empty page.
    pub async fn page(&self, filter: &FilterState) -> ResultPage {
        let query = compose_query(&self.table, filter, self.page_size);
        match self.store.select::<VideoRecord>(&query).await {
            Ok(Rows { data, count }) => {
                let total_count = count.unwrap_or(data.len());
                debug!(page = filter.page, items = data.len(), total_count, "page loaded");
                ResultPage {
                    items: data,
                    total_count,
                }
            }
            Err(e) => {
                error!(error = %e, page = filter.page, "video query failed");
                ResultPage::default()
            }
        }
    }
}
