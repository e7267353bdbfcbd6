//! Path utilities for URL splitting and scope normalization
//!
//! All functions are **pure**: given same input, always produce same output with no side effects.

use std::borrow::Cow;

/// Validates if a scope path is in canonical form
///
/// # Rules
///
/// - Must start with `/`
/// - Must not contain `//` or `\`
/// - Must not end with `/` (except root `/`)
/// - Must not be empty
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::path::is_valid_path;
///
/// assert!(is_valid_path("/"));
/// assert!(is_valid_path("/dashboard"));
///
/// assert!(!is_valid_path(""));
/// assert!(!is_valid_path("dashboard"));
/// assert!(!is_valid_path("/dashboard/"));
/// assert!(!is_valid_path("/dashboard//settings"));
/// ```
pub fn is_valid_path(path: &str) -> bool {
    if path.is_empty() || !path.starts_with('/') {
        return false;
    }

    if path.contains("//") || path.contains('\\') {
        return false;
    }

    path == "/" || !path.ends_with('/')
}

/// Normalize a scope path to canonical form
///
/// Layout scopes and 404 prefixes are compared against pathnames with plain
/// prefix tests, so they are canonicalized once when the route table is
/// built. Returns `Cow::Borrowed` when the input is already canonical.
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::path::normalize_path;
/// use std::borrow::Cow;
///
/// assert!(matches!(normalize_path("/dashboard"), Cow::Borrowed("/dashboard")));
/// assert_eq!(normalize_path("dashboard/"), "/dashboard");
/// assert_eq!(normalize_path("\\admin\\users"), "/admin/users");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if is_valid_path(path) {
        return Cow::Borrowed(path);
    }

    let normalized = path
        .replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if normalized.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(format!("/{}", normalized))
    }
}

/// Splits a path into its non-empty segments
///
/// `/a//b` and `/a/b` yield the same segments; `/`, `///` and the empty
/// string yield none.
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::path::split_segments;
///
/// let segments: Vec<&str> = split_segments("/blog//2024/").collect();
/// assert_eq!(segments, vec!["blog", "2024"]);
/// assert_eq!(split_segments("///").count(), 0);
/// ```
pub fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Splits a URL into pathname and query string, dropping any fragment
///
/// The returned query has no leading `?`. An empty pathname becomes `/`.
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::path::split_url;
///
/// assert_eq!(split_url("/search?q=rust#top"), ("/search", "q=rust"));
/// assert_eq!(split_url("?page=2"), ("/", "page=2"));
/// assert_eq!(split_url("/about"), ("/about", ""));
/// ```
pub fn split_url(url: &str) -> (&str, &str) {
    let without_fragment = url.split_once('#').map_or(url, |(before, _)| before);
    let (pathname, query) = without_fragment
        .split_once('?')
        .unwrap_or((without_fragment, ""));

    if pathname.is_empty() {
        ("/", query)
    } else {
        (pathname, query)
    }
}
