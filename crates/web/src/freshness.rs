use http::header::{HeaderMap, CACHE_CONTROL, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use std::time::SystemTime;

/// Compares request validators against staged response validators.
///
/// `true` means the client copy is still usable: every validator the client
/// sent is satisfied by what the response is about to carry. Validator
/// precedence and the `Cache-Control: no-cache` escape hatch follow the
/// common proxy-tested behavior.
pub(crate) fn fresh(request: &HeaderMap, response: &HeaderMap) -> bool {
    let if_modified_since = header_str(request, IF_MODIFIED_SINCE);
    let if_none_match = header_str(request, IF_NONE_MATCH);

    if if_modified_since.is_none() && if_none_match.is_none() {
        return false;
    }

    // An end-to-end reload bypasses validators entirely.
    if let Some(cache_control) = header_str(request, CACHE_CONTROL) {
        if token_list(cache_control).any(|token| token.eq_ignore_ascii_case("no-cache")) {
            return false;
        }
    }

    if let Some(none_match) = if_none_match {
        if none_match.trim() != "*" {
            let Some(etag) = header_str(response, ETAG) else {
                return false;
            };
            let matched = token_list(none_match).any(|tag| etag_matches(tag, etag));
            if !matched {
                return false;
            }
        }
    }

    if let Some(modified_since) = if_modified_since {
        let unmodified = parse_date(response, LAST_MODIFIED)
            .zip(parse_http_date(modified_since))
            .is_some_and(|(last_modified, since)| last_modified <= since);
        if !unmodified {
            return false;
        }
    }

    true
}

/// Weak comparison: `W/"x"` and `"x"` validate each other.
fn etag_matches(candidate: &str, etag: &str) -> bool {
    strip_weak(candidate) == strip_weak(etag)
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

fn token_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|token| !token.is_empty())
}

fn header_str(headers: &HeaderMap, name: http::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn parse_date(headers: &HeaderMap, name: http::header::HeaderName) -> Option<SystemTime> {
    header_str(headers, name).and_then(parse_http_date)
}

fn parse_http_date(value: &str) -> Option<SystemTime> {
    httpdate::parse_http_date(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(entries: &[(http::header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in entries {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    const OLD: &str = "Sat, 01 Jan 2022 00:00:00 GMT";
    const NEW: &str = "Sun, 01 Jan 2023 00:00:00 GMT";

    #[test]
    fn no_validators_is_stale() {
        assert!(!fresh(&HeaderMap::new(), &headers(&[(ETAG, "\"a\"")])));
    }

    #[test]
    fn matching_etag_is_fresh() {
        let request = headers(&[(IF_NONE_MATCH, "\"a\"")]);
        let response = headers(&[(ETAG, "\"a\"")]);
        assert!(fresh(&request, &response));
    }

    #[test]
    fn mismatched_etag_is_stale() {
        let request = headers(&[(IF_NONE_MATCH, "\"a\"")]);
        let response = headers(&[(ETAG, "\"b\"")]);
        assert!(!fresh(&request, &response));
    }

    #[test]
    fn weak_etag_validates_strong() {
        let request = headers(&[(IF_NONE_MATCH, "W/\"a\"")]);
        let response = headers(&[(ETAG, "\"a\"")]);
        assert!(fresh(&request, &response));
    }

    #[test]
    fn etag_list_matches_any_entry() {
        let request = headers(&[(IF_NONE_MATCH, "\"x\", \"y\", \"a\"")]);
        let response = headers(&[(ETAG, "\"a\"")]);
        assert!(fresh(&request, &response));
    }

    #[test]
    fn star_matches_without_etag() {
        let request = headers(&[(IF_NONE_MATCH, "*")]);
        assert!(fresh(&request, &HeaderMap::new()));
    }

    #[test]
    fn unmodified_since_is_fresh() {
        let request = headers(&[(IF_MODIFIED_SINCE, NEW)]);
        let response = headers(&[(LAST_MODIFIED, OLD)]);
        assert!(fresh(&request, &response));
    }

    #[test]
    fn modified_after_is_stale() {
        let request = headers(&[(IF_MODIFIED_SINCE, OLD)]);
        let response = headers(&[(LAST_MODIFIED, NEW)]);
        assert!(!fresh(&request, &response));
    }

    #[test]
    fn missing_last_modified_is_stale() {
        let request = headers(&[(IF_MODIFIED_SINCE, NEW)]);
        assert!(!fresh(&request, &HeaderMap::new()));
    }

    #[test]
    fn unparseable_date_is_stale() {
        let request = headers(&[(IF_MODIFIED_SINCE, "yesterday-ish")]);
        let response = headers(&[(LAST_MODIFIED, OLD)]);
        assert!(!fresh(&request, &response));
    }

    #[test]
    fn both_validators_must_pass() {
        let request = headers(&[(IF_NONE_MATCH, "\"a\""), (IF_MODIFIED_SINCE, OLD)]);
        let response = headers(&[(ETAG, "\"a\""), (LAST_MODIFIED, NEW)]);
        assert!(!fresh(&request, &response));
    }

    #[test]
    fn no_cache_forces_stale() {
        let request = headers(&[(IF_NONE_MATCH, "\"a\""), (CACHE_CONTROL, "no-cache")]);
        let response = headers(&[(ETAG, "\"a\"")]);
        assert!(!fresh(&request, &response));
    }
}
