use std::collections::BTreeSet;

use percent_encoding::percent_decode_str;
use tracing::{debug, error, warn};

use super::parsing::split_categories;
use super::{CATEGORY, Catalog, LANGUAGE, TITLE};
use crate::store::VideoStore;
use crate::store::query::{Direction, Filter, Query, escape_like};
use crate::store::types::{CategoryLanguageRow, VideoRecord};

/// Rows scanned when collecting filter options.
const OPTIONS_SCAN_LIMIT: usize = 1000;
const FUZZY_CANDIDATES: usize = 5;
const RELATED_LIMIT: usize = 6;

/// Distinct values offered in the category and language filters, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub categories: Vec<String>,
    pub languages: Vec<String>,
}

/// Decode a title taken from a link and fold typographic apostrophes.
pub fn normalize_title(raw: &str) -> String {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    fold_apostrophes(&decoded)
}

fn fold_apostrophes(s: &str) -> String {
    s.replace('\u{2019}', "'").trim().to_string()
}

/// Contains-pattern where each apostrophe matches any single character, so
/// stored titles using `’` are still found.
fn apostrophe_tolerant_pattern(title: &str) -> String {
    format!("%{}%", escape_like(title).replace('\'', "_"))
}

impl<S: VideoStore> Catalog<S> {
    pub async fn filter_options(&self) -> FilterOptions {
        let query = Query::select(&self.table, "category,language").limit(OPTIONS_SCAN_LIMIT);
        let rows = match self.store.select::<CategoryLanguageRow>(&query).await {
            Ok(rows) => rows.data,
            Err(e) => {
                error!(error = %e, "failed to load filter options");
                return FilterOptions::default();
            }
        };

        let mut categories = BTreeSet::new();
        let mut languages = BTreeSet::new();
        for row in &rows {
            if let Some(line) = row.category.as_deref() {
                categories.extend(split_categories(line).into_iter().map(String::from));
            }
            if let Some(lang) = row.language.as_deref().map(str::trim)
                && !lang.is_empty()
            {
                languages.insert(lang.to_string());
            }
        }

        debug!(
            rows = rows.len(),
            categories = categories.len(),
            languages = languages.len(),
            "filter options loaded"
        );
        FilterOptions {
            categories: categories.into_iter().collect(),
            languages: languages.into_iter().collect(),
        }
    }

    /// Look a video up by title: exact match first, then a case-insensitive
    /// contains match preferring the candidate equal to `title` after folding
    /// apostrophes. `title` is taken as already decoded (see `normalize_title`).
    /// Failures are logged and yield `None`.
    pub async fn find_video(&self, title: &str) -> Option<VideoRecord> {
        let title = fold_apostrophes(title);
        if title.is_empty() {
            return None;
        }

        let exact = Query::select(&self.table, "*")
            .filter(Filter::eq(TITLE, &title))
            .limit(1);
        match self.store.select::<VideoRecord>(&exact).await {
            Ok(rows) => {
                if let Some(found) = rows.data.into_iter().next() {
                    return Some(found);
                }
            }
            Err(e) => warn!(error = %e, %title, "exact title lookup failed"),
        }

        let fuzzy = Query::select(&self.table, "*")
            .filter(Filter::ILike {
                column: TITLE.to_string(),
                pattern: apostrophe_tolerant_pattern(&title),
            })
            .order(TITLE, Direction::Asc)
            .limit(FUZZY_CANDIDATES);
        let candidates = match self.store.select::<VideoRecord>(&fuzzy).await {
            Ok(rows) => rows.data,
            Err(e) => {
                error!(error = %e, %title, "fuzzy title lookup failed");
                return None;
            }
        };

        let position = candidates
            .iter()
            .position(|v| fold_apostrophes(&v.title) == title)
            .unwrap_or(0);
        candidates.into_iter().nth(position)
    }

    /// Up to six other videos sharing the first category, else the language.
    pub async fn related(&self, current: &VideoRecord) -> Vec<VideoRecord> {
        let mut query = Query::select(&self.table, "*")
            .filter(Filter::neq(TITLE, &current.title))
            .limit(RELATED_LIMIT);

        let language = current
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());
        if let Some(category) = current.first_category() {
            query = query.filter(Filter::contains(CATEGORY, category));
        } else if let Some(language) = language {
            query = query.filter(Filter::contains(LANGUAGE, language));
        }

        match self.store.select::<VideoRecord>(&query).await {
            Ok(rows) => rows.data,
            Err(e) => {
                error!(error = %e, title = %current.title, "related videos query failed");
                Vec::new()
            }
        }
    }
}
