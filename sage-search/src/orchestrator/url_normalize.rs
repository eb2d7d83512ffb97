//! URL normalisation for candidate deduplication.
//!
//! Canonicalises URLs so that equivalent pages (differing only in scheme
//! or host capitalisation, default ports, a trailing slash, or a fragment)
//! compare as equal. The query string is kept as-is: parameter order can
//! be meaningful to the serving site.

use url::Url;

/// Normalise a URL for deduplication and fetching.
///
/// Applies the following transformations:
///
/// 1. Lowercase scheme and host (path and query are preserved as-is).
/// 2. Remove default ports (`:80` for HTTP, `:443` for HTTPS).
/// 3. Remove trailing slash from the path (unless path is exactly `"/"`).
/// 4. Remove the fragment (`#…`).
///
/// Returns `None` if the input is not an absolute `http`/`https` URL with
/// a host; such hits cannot be fetched and never become candidates.
///
/// # Examples
///
/// ```
/// use sage_search::orchestrator::url_normalize::normalize_url;
///
/// let a = normalize_url("HTTPS://Example.COM:443/path/#section");
/// let b = normalize_url("https://example.com/path");
/// assert_eq!(a, b);
/// ```
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut parsed = Url::parse(raw.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }

    parsed.set_fragment(None);

    if is_default_port(&parsed) {
        let _ = parsed.set_port(None);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
        if parsed.path().is_empty() {
            parsed.set_path("/");
        }
    }

    // Url::parse already lowercases scheme and host, so the serialised
    // form is canonical.
    Some(parsed.to_string())
}

/// Returns `true` if the URL uses the default port for its scheme.
fn is_default_port(url: &Url) -> bool {
    matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    )
}
