//! Plain-text rendering of command results.

use url::Url;

use crate::auth::types::Session;
use crate::library::{FilterOptions, FilterState, PAGE_SIZE, ResultPage, total_pages};
use crate::share::{ShareLinks, watch_url};
use crate::store::types::VideoRecord;

fn describe_filter(filter: &FilterState, out: &mut String) {
    if filter.is_unfiltered() {
        return;
    }
    let mut parts = Vec::new();
    if !filter.text().is_empty() {
        parts.push(format!("text \"{}\"", filter.text()));
    }
    if !filter.categories().is_empty() {
        let names: Vec<&str> = filter.categories().iter().map(String::as_str).collect();
        parts.push(format!("categories {}", names.join(" | ")));
    }
    if !filter.language().is_empty() {
        parts.push(format!("language {}", filter.language()));
    }
    out.push_str(&format!("filters: {}\n\n", parts.join(", ")));
}

fn summary_line(video: &VideoRecord) -> String {
    let mut line = video.title.clone();
    let meta: Vec<&str> = [video.first_category(), video.language.as_deref().map(str::trim)]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
    if !meta.is_empty() {
        line.push_str(&format!(" [{}]", meta.join(" / ")));
    }
    line
}

pub fn format_page(filter: &FilterState, page: &ResultPage) -> String {
    let mut out = String::new();
    describe_filter(filter, &mut out);

    if page.items.is_empty() {
        out.push_str("No videos found.\n");
    } else {
        let first = (filter.page() - 1).saturating_mul(PAGE_SIZE).saturating_add(1);
        for (i, video) in page.items.iter().enumerate() {
            let n = first.saturating_add(i);
            out.push_str(&format!("{n:>4}. {}\n", summary_line(video)));
        }
    }

    let pages = total_pages(page.total_count);
    out.push_str(&format!(
        "\npage {} of {} ({} videos)\n",
        filter.page(),
        pages,
        page.total_count
    ));
    out
}

/// Full details of one video, as shown on its watch page.
pub fn format_video(video: &VideoRecord, site: &Url) -> String {
    let mut out = format!("# {}\n\n", video.title);

    if let Some(desc) = video.description.as_deref().map(str::trim)
        && !desc.is_empty()
    {
        out.push_str(&format!("{desc}\n\n"));
    }

    let categories = video.categories();
    if !categories.is_empty() {
        out.push_str(&format!("categories: {}\n", categories.join(", ")));
    }
    if let Some(lang) = video.language.as_deref().map(str::trim)
        && !lang.is_empty()
    {
        out.push_str(&format!("language: {lang}\n"));
    }
    let tags = video.tags();
    if !tags.is_empty() {
        out.push_str(&format!("tags: {}\n", tags.join(", ")));
    }
    match video.embed_url() {
        Some(embed) => out.push_str(&format!("player: {embed}\n")),
        None => {
            if let Some(src) = video.source_url.as_deref() {
                out.push_str(&format!("source: {src}\n"));
            }
        }
    }
    if let Some(thumb) = video.thumbnail() {
        out.push_str(&format!("thumbnail: {thumb}\n"));
    }
    out.push_str(&format!("page: {}\n", watch_url(site, &video.title)));
    out
}

pub fn format_related(related: &[VideoRecord]) -> String {
    if related.is_empty() {
        return "No related videos.\n".to_string();
    }
    let mut out = String::from("Related videos:\n");
    for video in related {
        out.push_str(&format!("- {}\n", summary_line(video)));
    }
    out
}

pub fn format_options(options: &FilterOptions) -> String {
    let mut out = String::from("Categories:\n");
    if options.categories.is_empty() {
        out.push_str("  (none)\n");
    }
    for category in &options.categories {
        out.push_str(&format!("  {category}\n"));
    }
    out.push_str("\nLanguages:\n");
    if options.languages.is_empty() {
        out.push_str("  (none)\n");
    }
    for language in &options.languages {
        out.push_str(&format!("  {language}\n"));
    }
    out
}

pub fn format_share(links: &ShareLinks) -> String {
    format!(
        "link:     {}\nwhatsapp: {}\nemail:    {}\n",
        links.page_url, links.whatsapp, links.email
    )
}

pub fn format_whoami(session: Option<&Session>) -> String {
    match session {
        Some(session) => {
            let who = session.user.email.as_deref().unwrap_or(&session.user.id);
            format!("Signed in as {who}\n")
        }
        None => "Not signed in.\n".to_string(),
    }
}
