//! Callback placeholder substitution for JSONP locators

/// Reserved token callers put in the query string where the callback name goes
pub const CALLBACK_PLACEHOLDER: &str = "JSONP_CALLBACK";

const INNER_PATTERN: &str = "=JSONP_CALLBACK&";
const TRAILING_PATTERN: &str = "=JSONP_CALLBACK";

/// Returns true if [`rewrite`] would substitute a callback into `url`
pub fn has_placeholder(url: &str) -> bool {
    url.contains(INNER_PATTERN) || url.ends_with(TRAILING_PATTERN)
}

/// Substitute `callback` for the placeholder in `url`.
///
/// Two positions are recognised: a parameter followed by another one
/// (`=JSONP_CALLBACK&`, first occurrence only) and the final parameter
/// (`=JSONP_CALLBACK` at the end of the string). Anything else is returned
/// unchanged.
pub fn rewrite(url: &str, callback: &str) -> String {
    if url.contains(INNER_PATTERN) {
        return url.replacen(INNER_PATTERN, &format!("={callback}&"), 1);
    }

    if let Some(prefix) = url.strip_suffix(TRAILING_PATTERN) {
        return format!("{prefix}={callback}");
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CB: &str = "__jsonp__.__req7.finished";

    #[test]
    fn test_rewrite_inner_parameter() {
        let url = "http://x/api?callback=JSONP_CALLBACK&q=rust";
        assert_eq!(
            rewrite(url, CB),
            "http://x/api?callback=__jsonp__.__req7.finished&q=rust"
        );
    }

    #[test]
    fn test_rewrite_only_first_inner_occurrence() {
        let url = "http://x/?a=JSONP_CALLBACK&b=JSONP_CALLBACK&c=1";
        assert_eq!(rewrite(url, "cb"), "http://x/?a=cb&b=JSONP_CALLBACK&c=1");
    }

    #[test]
    fn test_rewrite_trailing_parameter() {
        let url = "http://x/?cb=JSONP_CALLBACK";
        assert_eq!(rewrite(url, CB), "http://x/?cb=__jsonp__.__req7.finished");
    }

    #[test]
    fn test_inner_pattern_wins_over_trailing() {
        let url = "http://x/?a=JSONP_CALLBACK&b=JSONP_CALLBACK";
        assert_eq!(rewrite(url, "cb"), "http://x/?a=cb&b=JSONP_CALLBACK");
    }

    #[test]
    fn test_no_placeholder_is_identity() {
        for url in [
            "http://x/?cb=other",
            "http://x/?cb=JSONP_CALLBACKS",
            "http://x/JSONP_CALLBACK",
            "http://x/?cb=jsonp_callback",
            "",
        ] {
            assert_eq!(rewrite(url, CB), url);
            assert!(!has_placeholder(url));
        }
    }

    #[test]
    fn test_has_placeholder() {
        assert!(has_placeholder("http://x/?cb=JSONP_CALLBACK"));
        assert!(has_placeholder("http://x/?cb=JSONP_CALLBACK&x=1"));
    }
}
