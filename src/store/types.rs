use serde::{Deserialize, Serialize};

/// A row of the videos table. Only the title is guaranteed non-null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    #[serde(rename = "videotitle")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Newline-delimited category list.
    #[serde(rename = "category", default)]
    pub category_line: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(rename = "yt_tags", default)]
    pub tags_csv: Option<String>,
    #[serde(rename = "yt_url", default)]
    pub source_url: Option<String>,
    #[serde(rename = "thumbnail", default)]
    pub thumbnail_url: Option<String>,
}

/// Projection used when collecting filter options.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryLanguageRow {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Decoded response of a select: rows plus the exact count when requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rows<T> {
    pub data: Vec<T>,
    pub count: Option<usize>,
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}
