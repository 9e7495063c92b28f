//! URL canonicalization shared by both crawl phases and the fuzz target list.

use url::Url;

/// Canonical string for a URL: `scheme://host[:port]/path` with the query and
/// fragment dropped and any trailing slash trimmed.
pub fn canonicalize(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let path = url.path().trim_end_matches('/');
    format!("{}://{}{}", url.scheme(), authority, path)
}

/// Parse and canonicalize; `None` if the input is not an absolute URL.
pub fn normalize_url(raw: &str) -> Option<String> {
    Url::parse(raw.trim()).ok().map(|u| canonicalize(&u))
}

/// Identical scheme, host, and port.
pub fn is_same_origin(url: &Url, origin: &Url) -> bool {
    url.scheme() == origin.scheme()
        && url.host_str() == origin.host_str()
        && url.port_or_known_default() == origin.port_or_known_default()
}

pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}

/// Resolve an href against the page it appeared on, skipping non-navigational
/// schemes and fragment-only links.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);
    is_http(&resolved).then_some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_and_fragment_collapse() {
        assert_eq!(
            normalize_url("http://test.local/").as_deref(),
            Some("http://test.local")
        );
        assert_eq!(
            normalize_url("http://test.local/page2/#top").as_deref(),
            Some("http://test.local/page2")
        );
        assert_eq!(
            normalize_url("http://test.local/page2"),
            normalize_url("http://test.local/page2/")
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "http://test.local/",
            "https://example.com:8443/a/b/?q=1#frag",
            "http://[::1]/api/",
            "http://example.com//double//",
        ] {
            let once = normalize_url(raw).unwrap();
            let twice = normalize_url(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn test_query_is_dropped() {
        assert_eq!(
            normalize_url("http://example.com/search?q=1").as_deref(),
            Some("http://example.com/search")
        );
    }

    #[test]
    fn test_port_is_kept() {
        assert_eq!(
            normalize_url("http://example.com:8080/api").as_deref(),
            Some("http://example.com:8080/api")
        );
        assert_eq!(
            normalize_url("http://example.com:80/api").as_deref(),
            Some("http://example.com/api")
        );
    }

    #[test]
    fn test_invalid_url() {
        assert_eq!(normalize_url("not a url"), None);
    }

    #[test]
    fn test_same_origin() {
        let origin = Url::parse("http://example.com/").unwrap();
        assert!(is_same_origin(&Url::parse("http://example.com/a").unwrap(), &origin));
        assert!(is_same_origin(&Url::parse("http://example.com:80/a").unwrap(), &origin));
        assert!(!is_same_origin(&Url::parse("https://example.com/a").unwrap(), &origin));
        assert!(!is_same_origin(&Url::parse("http://example.com:8080/").unwrap(), &origin));
        assert!(!is_same_origin(&Url::parse("http://api.example.com/").unwrap(), &origin));
    }

    #[test]
    fn test_resolve_href() {
        let base = Url::parse("http://example.com/dir/page").unwrap();
        assert_eq!(
            resolve_href(&base, "other#x").map(|u| u.to_string()),
            Some("http://example.com/dir/other".to_string())
        );
        assert!(resolve_href(&base, "#top").is_none());
        assert!(resolve_href(&base, "javascript:void(0)").is_none());
        assert!(resolve_href(&base, "mailto:a@b.c").is_none());
        assert!(resolve_href(&base, "ftp://example.com/file").is_none());
    }
}
