//! URL resolution for playlist entries.
//!
//! Absolute (`http://`, `https://`) URLs are returned unchanged, root-relative
//! URLs (`/path`) are placed on the base URL's origin, and everything else is
//! joined onto the base URL's directory.
//!
//! Joining follows RFC 3986 reference resolution, so a few inputs go beyond
//! plain string splicing:
//! - scheme-relative `//host/path` takes the base scheme and its own host
//! - any other absolute URL (`ftp://`, `data:`) is kept as is
//! - `.` and `..` segments are normalized
//! - characters not allowed in a URL, such as spaces, are percent-encoded

use url::Url;

/// Resolve `url` against `base`, the URL of the playlist that referenced it.
pub fn resolve_url(url: &str, base: &str) -> String {
    if has_http_scheme(url) {
        return url.to_string();
    }

    if let Ok(base_url) = Url::parse(base)
        && let Ok(joined) = base_url.join(url)
    {
        return joined.to_string();
    }

    resolve_by_splicing(url, base)
}

fn has_http_scheme(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

// Fallback for bases the `url` crate rejects.
fn resolve_by_splicing(url: &str, base: &str) -> String {
    if let Some(rooted) = url.strip_prefix('/') {
        if let Some(scheme_end) = base.find("://") {
            let after_scheme = &base[scheme_end + 3..];
            let host_end = after_scheme.find('/').unwrap_or(after_scheme.len());
            return format!("{}/{}", &base[..scheme_end + 3 + host_end], rooted);
        }
        return url.to_string();
    }

    match base.rfind('/') {
        Some(pos) => format!("{}{}", &base[..=pos], url),
        None => url.to_string(),
    }
}
