//! Site-relative path handling.
//!
//! Store keys are absolute: the site prefix (for example `https://example.com/`)
//! followed by a canonical relative path such as `blog/2024/hello`. The home page
//! is the prefix itself.

use std::fmt;

/// Canonicalizes a relative content path.
///
/// - backslashes become slashes, spaces and `+` become dashes
/// - leading `.` and `/` characters are removed
/// - empty segments are dropped and segments may not start with a period
///   (so `.`, `..` and hidden names lose their dots)
/// - the path may not end with a period, dash or slash
pub fn canonicalize_path(path: &str) -> String {
    let normalized: String = path
        .chars()
        .map(|ch| match ch {
            '\\' => '/',
            ' ' | '+' => '-',
            other => other,
        })
        .collect();

    let segments: Vec<&str> = normalized
        .split('/')
        .map(|segment| segment.trim_start_matches('.'))
        .filter(|segment| !segment.is_empty())
        .collect();

    segments.join("/").trim_end_matches(['.', '-', '/']).to_owned()
}

/// The absolute key prefix shared by every page of one site.
///
/// Always stored with a trailing slash.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SitePrefix(String);

impl SitePrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Turns a caller supplied path into an absolute store key.
    ///
    /// A path that already carries the prefix is kept verbatim. Anything else,
    /// including the empty path (the home page), is canonicalized and prefixed.
    pub fn absolute(&self, path: &str) -> String {
        if !path.is_empty() && path.starts_with(self.0.as_str()) {
            return path.to_owned();
        }
        if path == self.0.trim_end_matches('/') {
            return self.0.clone();
        }
        format!("{}{}", self.0, canonicalize_path(path))
    }

    /// Strips the prefix from an absolute key.
    pub fn relative<'a>(&self, absolute: &'a str) -> Option<&'a str> {
        absolute.strip_prefix(self.0.as_str())
    }

    /// Whether `path` lies strictly below `ancestor` in the page hierarchy.
    pub fn is_descendant(path: &str, ancestor: &str) -> bool {
        if path.len() <= ancestor.len() || !path.starts_with(ancestor) {
            return false;
        }
        ancestor.ends_with('/') || path[ancestor.len()..].starts_with('/')
    }
}

impl fmt::Display for SitePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SitePrefix {
    fn from(value: &str) -> Self {
        SitePrefix::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "")]
    #[case("/a/b", "a/b")]
    #[case("a//b///c", "a/b/c")]
    #[case("./a/./b/../c", "a/b/c")]
    #[case("a\\b", "a/b")]
    #[case("my page+1", "my-page-1")]
    #[case("a/b/", "a/b")]
    #[case("a/b.-", "a/b")]
    #[case("types/.hidden/x", "types/hidden/x")]
    #[case("a/b::*", "a/b::*")]
    fn canonicalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(canonicalize_path(input), expected);
    }

    #[rstest]
    fn prefix_always_ends_with_slash() {
        assert_eq!(SitePrefix::new("http://example.com").as_str(), "http://example.com/");
        assert_eq!(SitePrefix::new("http://example.com/").as_str(), "http://example.com/");
    }

    #[rstest]
    #[case("", "http://example.com/")]
    #[case("/a/b/", "http://example.com/a/b")]
    #[case("http://example.com/a//b", "http://example.com/a//b")]
    #[case("http://example.com", "http://example.com/")]
    fn absolute_keys(#[case] input: &str, #[case] expected: &str) {
        let site = SitePrefix::new("http://example.com/");
        assert_eq!(site.absolute(input), expected);
    }

    #[rstest]
    #[case("http://x/a/b", "http://x/a", true)]
    #[case("http://x/a/b", "http://x/", true)]
    #[case("http://x/ab", "http://x/a", false)]
    #[case("http://x/a", "http://x/a", false)]
    #[case("http://x/a", "http://x/a/b", false)]
    fn descendant_check(#[case] path: &str, #[case] ancestor: &str, #[case] expected: bool) {
        assert_eq!(SitePrefix::is_descendant(path, ancestor), expected);
    }

    #[rstest]
    fn relative_strips_prefix() {
        let site = SitePrefix::new("http://x/");
        assert_eq!(site.relative("http://x/a/b"), Some("a/b"));
        assert_eq!(site.relative("http://y/a"), None);
    }
}
