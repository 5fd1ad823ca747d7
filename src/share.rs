use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::Url;

/// Characters kept verbatim by `encodeURIComponent`; everything else is escaped.
const COMPONENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub(crate) fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT_ENCODE_SET).to_string()
}

/// Site-relative path of a video's watch page.
pub fn watch_path(title: &str) -> String {
    format!("/watch/{}", encode_component(title))
}

/// Absolute watch-page URL under `site`.
pub fn watch_url(site: &Url, title: &str) -> String {
    let origin = site.as_str().trim_end_matches('/');
    format!("{origin}{}", watch_path(title))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLinks {
    pub page_url: String,
    pub whatsapp: String,
    pub email: String,
}

pub fn share_links(site: &Url, title: &str) -> ShareLinks {
    let page_url = watch_url(site, title);
    let text = encode_component(title);
    let encoded_url = encode_component(&page_url);
    ShareLinks {
        whatsapp: format!("https://wa.me/?text={text}%20{encoded_url}"),
        email: format!("mailto:?subject={text}&body={encoded_url}"),
        page_url,
    }
}
