//! Where to send the user after signing in.

use percent_encoding::percent_decode_str;
use url::Url;

pub const HOME: &str = "/";

/// Turn a raw "next" value into a safe site-relative path.
///
/// The value is percent-decoded once (kept raw if that yields invalid UTF-8).
/// Same-origin absolute URLs are reduced to path, query and fragment. Empty
/// values, bare fragments and anything under `/auth` map to `/`.
pub fn normalize_next(raw: &str, site: &Url) -> String {
    let trimmed = raw.trim();
    let decoded = percent_decode_str(trimmed)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| trimmed.to_string());

    let mut next = decoded.clone();
    if let Ok(resolved) = site.join(&decoded)
        && resolved.origin() == site.origin()
    {
        next = resolved.path().to_string();
        if let Some(query) = resolved.query() {
            next.push('?');
            next.push_str(query);
        }
        if let Some(fragment) = resolved.fragment() {
            next.push('#');
            next.push_str(fragment);
        }
    }

    if next.is_empty() || next == "#" || next == "/#" {
        return HOME.to_string();
    }
    if !next.starts_with('/') {
        next.insert(0, '/');
    }
    while next.starts_with("//") {
        next.remove(0);
    }
    if next.starts_with("/auth") {
        return HOME.to_string();
    }
    next
}

/// Pick the post-login destination: an explicit value, then the stored one, then home.
pub fn resolve_next(explicit: Option<&str>, stored: Option<&str>, site: &Url) -> String {
    let chosen = [explicit, stored]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or(HOME);
    normalize_next(chosen, site)
}
