//! Junk URL filtering applied before deduplication.

/// Substrings that mark a URL as noise.
pub const DEFAULT_DENY_SUBSTRINGS: &[&str] =
    &["sg_error.php", "error.php", "cdn-cgi", "logout", "jquery", "/404"];

/// Static asset extensions, matched at the end of the URL or of its path.
pub const DEFAULT_DENY_SUFFIXES: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".css", ".woff", ".woff2", ".eot", ".ttf", ".ico",
];

/// A fixed set of rules rejecting uninteresting URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denylist {
    substrings: Vec<String>,
    suffixes: Vec<String>,
}

impl Default for Denylist {
    fn default() -> Self {
        Self {
            substrings: DEFAULT_DENY_SUBSTRINGS.iter().map(ToString::to_string).collect(),
            suffixes: DEFAULT_DENY_SUFFIXES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Denylist {
    /// A denylist that accepts everything.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            substrings: Vec::new(),
            suffixes: Vec::new(),
        }
    }

    /// Returns true if `url` should be dropped.
    ///
    /// Substrings match anywhere. Suffixes match, case-insensitively, the end
    /// of the whole line or the end of the part before any `?` or `#`.
    #[must_use]
    pub fn is_denied(&self, url: &str) -> bool {
        if self.substrings.iter().any(|s| url.contains(s.as_str())) {
            return true;
        }
        if self.suffixes.is_empty() {
            return false;
        }
        let line = url.to_ascii_lowercase();
        let path = line.split(['?', '#']).next().unwrap_or(&line);
        self.suffixes
            .iter()
            .any(|s| line.ends_with(s.as_str()) || path.ends_with(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substrings() {
        let deny = Denylist::default();
        assert!(deny.is_denied("https://a.example.com/sg_error.php?x=1"));
        assert!(deny.is_denied("https://a.example.com/cdn-cgi/l/email-protection"));
        assert!(deny.is_denied("https://a.example.com/account/logout"));
        assert!(deny.is_denied("https://a.example.com/404"));
        assert!(!deny.is_denied("https://a.example.com/login?next=/home"));
    }

    #[test]
    fn test_suffixes_ignore_query_and_case() {
        let deny = Denylist::default();
        assert!(deny.is_denied("https://a.example.com/logo.PNG"));
        assert!(deny.is_denied("https://a.example.com/font.woff2?v=3"));
        assert!(deny.is_denied("https://a.example.com/app.css#top"));
        assert!(!deny.is_denied("https://a.example.com/app.js"));
        assert!(!deny.is_denied("https://a.example.com/page.png.html?id=1"));
    }

    #[test]
    fn test_suffix_at_end_of_line_is_denied() {
        let deny = Denylist::default();
        assert!(deny.is_denied("https://a.example.com/page?img=a.png"));
        assert!(deny.is_denied("https://a.example.com/x#f.css"));
        assert!(deny.is_denied("https://a.example.com/view?file=Banner.JPG"));
    }

    #[test]
    fn test_empty_accepts_everything() {
        assert!(!Denylist::empty().is_denied("https://a.example.com/logout.png"));
    }
}
