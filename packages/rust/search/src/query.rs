//! Search URL construction.

use url::Url;
use url::form_urlencoded::byte_serialize;

use courseware_shared::{CoursewareError, Result};

/// Query parameter carrying the search terms.
pub const SEARCH_QUERY_PARAM: &str = "search_query";

/// Append the search terms in `text` to `base` as a `search_query` parameter.
///
/// Terms are split on whitespace, percent-encoded individually and joined
/// with `+`. The parameter is appended with `&` when `base` already carries a
/// query, `?` otherwise.
pub fn build_query(base: &str, text: &str) -> Result<Url> {
    let terms: Vec<String> = text
        .split_whitespace()
        .map(|term| byte_serialize(term.as_bytes()).collect())
        .collect();
    let separator = if base.contains('?') { '&' } else { '?' };
    let query = format!("{base}{separator}{SEARCH_QUERY_PARAM}={}", terms.join("+"));

    Url::parse(&query)
        .map_err(|e| CoursewareError::validation(format!("invalid search URL {query}: {e}")))
}
