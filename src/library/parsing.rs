//! Field parsing for video rows: category lines, tag lists and YouTube URLs.

use url::Url;

use crate::store::types::VideoRecord;

/// Split a newline-delimited category line into trimmed, non-empty entries.
pub fn split_categories(line: &str) -> Vec<&str> {
    line.lines().map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Split a comma-separated tag string into trimmed, non-empty tags.
pub fn split_tags(csv: &str) -> Vec<&str> {
    csv.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn is_video_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

/// Extract the video id from `watch?v=`, `youtu.be/`, `/embed/`, `/shorts/` and `/live/` URLs.
pub fn youtube_id(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let id = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" | "music.youtube.com" => {
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("embed" | "shorts" | "live" | "v") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_video_id(&id).then_some(id)
}

pub fn thumbnail_for_id(id: &str) -> String {
    format!("https://img.youtube.com/vi/{id}/hqdefault.jpg")
}

pub fn embed_url(id: &str) -> String {
    format!("https://www.youtube.com/embed/{id}")
}

impl VideoRecord {
    pub fn categories(&self) -> Vec<&str> {
        self.category_line
            .as_deref()
            .map(split_categories)
            .unwrap_or_default()
    }

    pub fn first_category(&self) -> Option<&str> {
        self.categories().into_iter().next()
    }

    pub fn tags(&self) -> Vec<&str> {
        self.tags_csv.as_deref().map(split_tags).unwrap_or_default()
    }

    pub fn youtube_id(&self) -> Option<String> {
        self.source_url.as_deref().and_then(youtube_id)
    }

    /// Stored thumbnail, else one derived from the YouTube id.
    pub fn thumbnail(&self) -> Option<String> {
        self.thumbnail_url
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| self.youtube_id().map(|id| thumbnail_for_id(&id)))
    }

    pub fn embed_url(&self) -> Option<String> {
        self.youtube_id().map(|id| embed_url(&id))
    }
}
