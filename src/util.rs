use axum::http::{HeaderMap, HeaderValue, Uri, header};
use serde_json::{Map, Value};

use crate::generalkey;

/// Headers as a JSON object, the shape they are logged and echoed in.
pub type HeaderMapJson = Map<String, Value>;

/// Render a header value as text.
///
/// Values that are not visible ASCII are decoded lossily and tagged with a
/// marker instead of being dropped.
pub fn header_value_to_string(value: &HeaderValue) -> String {
    match value.to_str() {
        Ok(s) => s.to_string(),
        Err(_) => format!(
            "{} {}",
            String::from_utf8_lossy(value.as_bytes()),
            generalkey::UNRENDERABLE_HEADER
        ),
    }
}

/// Convert headers into a JSON map. Repeated names are joined with `", "`.
pub fn header_to_map(headers: &HeaderMap) -> HeaderMapJson {
    let mut map = HeaderMapJson::new();

    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(header_value_to_string)
            .collect::<Vec<_>>()
            .join(", ");
        map.insert(name.to_string(), Value::String(joined));
    }

    map
}

/// Get a header value as string, case-insensitive. Empty when absent.
pub fn header_to_string(headers: &HeaderMap, name: &str) -> String {
    headers
        .iter()
        .find(|(k, _)| k.as_str().eq_ignore_ascii_case(name))
        .map(|(_, v)| header_value_to_string(v))
        .unwrap_or_default()
}

/// Decode a URL query string into ordered key/value pairs.
pub fn query_pairs(uri: &Uri) -> Vec<(String, String)> {
    uri.query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Key/value pairs as a JSON object; a later duplicate key wins.
pub fn pairs_to_map(pairs: &[(String, String)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

/// Reconstruct the full request URL.
///
/// Server-side request URIs usually carry only path and query, so the scheme
/// comes from `X-Forwarded-Proto` (default `http`) and the authority from the
/// `Host` header.
pub fn full_url(uri: &Uri, headers: &HeaderMap) -> String {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return uri.to_string();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()));

    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    match host {
        Some(host) => {
            let scheme = headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .or_else(|| uri.scheme_str())
                .unwrap_or("http");
            format!("{scheme}://{host}{path}")
        }
        None => path.to_string(),
    }
}
