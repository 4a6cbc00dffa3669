use url::Url;

/// Parse absolute, protocol-relative (`//host/path`) or scheme-less
/// (`host/path`) URLs. Protocol-relative and scheme-less inputs are resolved
/// against `https`.
#[must_use]
pub fn parse_url_lenient(input: &str) -> Option<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Url::parse(&format!("https://{rest}")).ok();
    }
    match Url::parse(trimmed) {
        Ok(url) if url.has_host() => Some(url),
        _ => Url::parse(&format!("https://{trimmed}")).ok(),
    }
}

/// Look up a query parameter on a (possibly protocol-relative) URL.
#[must_use]
pub fn query_param(input: &str, name: &str) -> Option<String> {
    parse_url_lenient(input)?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Appends query parameters to a URL, handling both URLs with and without existing query strings.
/// Returns the original URL unchanged if params are empty.
#[must_use]
pub fn append_query_params(url: &str, params: &str) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    if url.contains('?') {
        format!("{}&{}", url, params)
    } else {
        format!("{}?{}", url, params)
    }
}
