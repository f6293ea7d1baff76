//! Pure, side-effect-free URL handling shared by every pod.
//!
//! `url::Url` already lowercases scheme/host, strips default ports for
//! "special" schemes, and resolves `.`/`..` path segments during parsing, so
//! `normalize` only has to add the trailing-slash and fragment policy on top.

use url::Url;

/// Hard cap from spec §3/§4.1/§8: URLs longer than this are rejected at add time.
pub const MAX_URL_LEN: usize = 2000;

/// Extensions (lowercase, without the leading dot) treated as non-text.
/// Matches the minimum set spec.md §4.1 requires.
const NON_TEXT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "ico", "mp4", "avi", "mov", "webm", "mp3",
    "wav", "flac", "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip", "tar", "gz", "7z",
    "rar", "exe", "dmg", "iso",
];

/// Returns a canonical absolute URL string, or `None` if `url` can't be
/// parsed as an absolute URL with a scheme.
///
/// Bare hostnames without a scheme are rejected here by construction:
/// `Url::parse` fails on a relative reference with no base URL to resolve
/// against.
pub fn normalize(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.set_fragment(None);

    let path = parsed.path().to_string();
    if path.is_empty() {
        parsed.set_path("/");
    } else if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(&path[..path.len() - 1]);
    }

    Some(parsed.to_string())
}

/// Returns the lowercased host of `url`, or `None` if it has no host
/// (e.g. it's malformed, or uses a schemeless/opaque form).
///
/// IDN handling is intentionally out of scope (per spec.md §4.1): whatever
/// `url::Url` hands back for the host is passed through unchanged besides
/// lowercasing.
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str().map(|h| h.to_lowercase())
}

/// Returns the path-and-query portion of `url` for robots.txt matching
/// (e.g. `/a/b?x=1`), or `/` if `url` doesn't parse.
pub fn path_for_robots(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "/".to_string();
    };
    match parsed.query() {
        Some(q) => format!("{}?{}", parsed.path(), q),
        None => parsed.path().to_string(),
    }
}

/// True iff the URL is over-length or its last path segment's extension
/// matches the non-text set.
pub fn is_likely_non_text(url: &str) -> bool {
    if url.len() > MAX_URL_LEN {
        return true;
    }
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(last_segment) = parsed.path_segments().and_then(|mut s| s.next_back()) else {
        return false;
    };
    let Some(ext) = last_segment.rsplit('.').next() else {
        return false;
    };
    if ext == last_segment {
        // no '.' in the segment
        return false;
    }
    NON_TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_scheme_and_host() {
        assert_eq!(
            normalize("HTTP://Example.COM/Path").unwrap(),
            "http://example.com/Path"
        );
    }

    #[test]
    fn normalize_strips_default_port_and_fragment() {
        assert_eq!(
            normalize("https://example.com:443/a#frag").unwrap(),
            "https://example.com/a"
        );
    }

    #[test]
    fn normalize_collapses_empty_path_and_trailing_slash() {
        assert_eq!(normalize("https://example.com").unwrap(), "https://example.com/");
        assert_eq!(
            normalize("https://example.com/a/").unwrap(),
            "https://example.com/a"
        );
        // root slash is never stripped
        assert_eq!(normalize("https://example.com/").unwrap(), "https://example.com/");
    }

    #[test]
    fn normalize_resolves_dot_segments() {
        assert_eq!(
            normalize("https://example.com/a/../b").unwrap(),
            "https://example.com/b"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("HTTPS://Example.com:443/a/b/../c/").unwrap();
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_rejects_bare_hostnames() {
        assert!(normalize("example.com/a").is_none());
        assert!(normalize("not a url").is_none());
    }

    #[test]
    fn normalize_rejects_non_http_schemes() {
        assert!(normalize("ftp://example.com/a").is_none());
    }

    #[test]
    fn extract_domain_lowercases_and_strips_port() {
        assert_eq!(
            extract_domain("https://Example.COM:8443/x").unwrap(),
            "example.com"
        );
    }

    #[test]
    fn non_text_extensions_detected() {
        assert!(is_likely_non_text("https://a.test/doc.pdf"));
        assert!(is_likely_non_text("https://a.test/img.JPG"));
        assert!(is_likely_non_text("https://a.test/file.tar.gz"));
        assert!(!is_likely_non_text("https://a.test/page.html"));
        assert!(!is_likely_non_text("https://a.test/page"));
    }

    #[test]
    fn non_text_ignores_query_and_fragment() {
        assert!(is_likely_non_text("https://a.test/img.png?x=1#y"));
        assert!(!is_likely_non_text("https://a.test/page?x=doc.pdf"));
    }

    #[test]
    fn path_for_robots_includes_query() {
        assert_eq!(path_for_robots("https://a.test/x?y=1"), "/x?y=1");
        assert_eq!(path_for_robots("https://a.test/x"), "/x");
        assert_eq!(path_for_robots("not a url"), "/");
    }

    #[test]
    fn over_length_url_is_non_text() {
        let long = format!("https://a.test/{}", "a".repeat(MAX_URL_LEN));
        assert!(is_likely_non_text(&long));
    }
}
