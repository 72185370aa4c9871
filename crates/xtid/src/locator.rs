//! Discovery of the versioned `ondemand.s.<hex>.js` asset in the landing page.
//!
//! Discovery is an ordered list of [`AssetMatcher`]s; the first one that
//! yields a URL wins. New page layouts are handled by adding a matcher, not by
//! touching the fetch or export stages.

use regex::Regex;
use scraper::Selector;

use crate::types::{Document, TidError, TidResult};

/// Base URL the chunk-map hash is appended to.
pub const ONDEMAND_BASE_URL: &str = "https://abs.twimg.com/responsive-web/client-web";

/// A single asset discovery rule.
pub trait AssetMatcher {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Return the absolute asset URL if this rule matches the document.
    fn find(&self, document: &Document) -> Option<String>;
}

/// Matches `<script src>` and `<link href>` elements whose file name is
/// `ondemand.s.<hex>.js`.
pub struct ScriptSrcMatcher {
    file_name: Regex,
}

impl ScriptSrcMatcher {
    pub fn new() -> Self {
        Self {
            file_name: Regex::new(r"^ondemand\.s\.[0-9a-fA-F]+\.js$").expect("valid regex"),
        }
    }

    fn matches(&self, raw: &str) -> bool {
        let without_query = raw.split(['?', '#']).next().unwrap_or(raw);
        let file = without_query.rsplit('/').next().unwrap_or(without_query);
        self.file_name.is_match(file)
    }
}

impl Default for ScriptSrcMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetMatcher for ScriptSrcMatcher {
    fn name(&self) -> &'static str {
        "script-src"
    }

    fn find(&self, document: &Document) -> Option<String> {
        for (selector, attr) in [("script[src]", "src"), ("link[href]", "href")] {
            let Ok(sel) = Selector::parse(selector) else {
                continue;
            };

            let hit = document
                .html()
                .select(&sel)
                .filter_map(|el| el.value().attr(attr))
                .map(str::trim)
                .find(|raw| self.matches(raw));

            if let Some(raw) = hit {
                if url::Url::parse(raw).is_ok() {
                    return Some(raw.to_string());
                }
                return document.url().join(raw).ok().map(String::from);
            }
        }
        None
    }
}

/// Matches the inline webpack chunk map entry `"ondemand.s":"<hash>"`.
pub struct ChunkMapMatcher {
    entry: Regex,
}

impl ChunkMapMatcher {
    pub fn new() -> Self {
        Self {
            entry: Regex::new(r#"["']ondemand\.s["']\s*:\s*["'](\w+)["']"#).expect("valid regex"),
        }
    }
}

impl Default for ChunkMapMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetMatcher for ChunkMapMatcher {
    fn name(&self) -> &'static str {
        "chunk-map"
    }

    fn find(&self, document: &Document) -> Option<String> {
        let hash = self.entry.captures(document.source())?.get(1)?.as_str();
        if hash.is_empty() {
            return None;
        }
        Some(format!("{ONDEMAND_BASE_URL}/ondemand.s.{hash}a.js"))
    }
}

/// Ordered set of asset matchers.
pub struct AssetLocator {
    matchers: Vec<Box<dyn AssetMatcher>>,
}

impl AssetLocator {
    /// Locator with an explicit matcher order.
    pub fn new(matchers: Vec<Box<dyn AssetMatcher>>) -> Self {
        Self { matchers }
    }

    /// Append a matcher, tried after all existing ones.
    pub fn push(&mut self, matcher: impl AssetMatcher + 'static) {
        self.matchers.push(Box::new(matcher));
    }

    /// Names of the configured matchers, in order.
    pub fn matcher_names(&self) -> Vec<&'static str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }

    /// First matching asset URL, if any.
    pub fn locate(&self, document: &Document) -> Option<String> {
        self.matchers.iter().find_map(|matcher| {
            let url = matcher.find(document)?;
            tracing::debug!("Asset matcher '{}' found {url}", matcher.name());
            Some(url)
        })
    }

    /// Like [`locate`](Self::locate), but a miss is an error.
    pub fn require(&self, document: &Document) -> TidResult<String> {
        self.locate(document).ok_or_else(|| {
            let hint = miss_hint(document);
            tracing::warn!("No asset matcher matched {}{hint}", document.url());
            TidError::AssetNotFound {
                page: document.url().to_string(),
                hint,
            }
        })
    }
}

impl Default for AssetLocator {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ScriptSrcMatcher::new()),
            Box::new(ChunkMapMatcher::new()),
        ])
    }
}

fn miss_hint(document: &Document) -> &'static str {
    if is_login_page(document) {
        " (received a login page)"
    } else if document.source().len() < 10_000 {
        " (response too small, may be rate limited or blocked)"
    } else {
        " (page layout may have changed)"
    }
}

/// A login wall carries the login form component or says so in its title.
/// Plain links to `/i/flow/login` appear on every page and do not count.
fn is_login_page(document: &Document) -> bool {
    if document.source().contains("LoginForm") {
        return true;
    }
    let Ok(title) = Selector::parse("title") else {
        return false;
    };
    document.html().select(&title).any(|el| {
        let text = el.text().collect::<String>().to_ascii_lowercase();
        text.contains("log in") || text.contains("login")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Document {
        Document::parse("https://x.com/", html).unwrap()
    }

    #[test]
    fn test_script_src_absolute() {
        let d = doc(r#"<html><head><script src="https://x.com/path/ondemand.s.abc123.js"></script></head></html>"#);
        assert_eq!(
            AssetLocator::default().locate(&d).as_deref(),
            Some("https://x.com/path/ondemand.s.abc123.js")
        );
    }

    #[test]
    fn test_script_src_relative_is_resolved() {
        let d = doc(r#"<script src="/static/ondemand.s.00ff.js?v=2"></script>"#);
        assert_eq!(
            ScriptSrcMatcher::new().find(&d).as_deref(),
            Some("https://x.com/static/ondemand.s.00ff.js?v=2")
        );
    }

    #[test]
    fn test_script_src_ignores_non_hex_infix() {
        let d = doc(r#"<script src="https://x.com/ondemand.s.zzz.js"></script>
                       <script src="https://x.com/main.abc.js"></script>"#);
        assert!(ScriptSrcMatcher::new().find(&d).is_none());
    }

    #[test]
    fn test_preload_link_matches() {
        let d = doc(r#"<link rel="preload" as="script" href="https://abs.twimg.com/ondemand.s.9f8e7da.js">"#);
        assert_eq!(
            ScriptSrcMatcher::new().find(&d).as_deref(),
            Some("https://abs.twimg.com/ondemand.s.9f8e7da.js")
        );
    }

    #[test]
    fn test_chunk_map_both_quote_styles() {
        let m = ChunkMapMatcher::new();
        let d = doc(r#"<script>e.u=e=>({"ondemand.s":"7c1b3e9",x:1})</script>"#);
        assert_eq!(
            m.find(&d).as_deref(),
            Some("https://abs.twimg.com/responsive-web/client-web/ondemand.s.7c1b3e9a.js")
        );
        let d = doc(r#"<script>{'ondemand.s': 'beef42'}</script>"#);
        assert_eq!(
            m.find(&d).as_deref(),
            Some("https://abs.twimg.com/responsive-web/client-web/ondemand.s.beef42a.js")
        );
    }

    #[test]
    fn test_first_matcher_wins() {
        let d = doc(r#"<script src="https://x.com/ondemand.s.aa.js"></script>
                       <script>{"ondemand.s":"bb"}</script>"#);
        assert_eq!(
            AssetLocator::default().locate(&d).as_deref(),
            Some("https://x.com/ondemand.s.aa.js")
        );
    }

    #[test]
    fn test_no_match_is_absent() {
        let d = doc("<html><body><script src=\"/main.js\"></script></body></html>");
        assert!(AssetLocator::default().locate(&d).is_none());
        let err = AssetLocator::default().require(&d).unwrap_err();
        assert!(matches!(err, TidError::AssetNotFound { .. }));
        assert!(err.to_string().contains("too small"));
    }

    fn padded(head: &str, body: &str) -> Document {
        doc(&format!(
            "<html><head>{head}</head><body>{body}<div>{}</div></body></html>",
            "x".repeat(12_000)
        ))
    }

    #[test]
    fn test_login_links_do_not_mean_login_page() {
        let d = padded(
            "<title>Home / X</title>",
            r#"<a href="/i/flow/login">Log in</a><a href="/login">Sign in</a>"#,
        );
        let err = AssetLocator::default().require(&d).unwrap_err();
        assert!(err.to_string().contains("layout may have changed"), "{err}");
    }

    #[test]
    fn test_login_title_or_form_means_login_page() {
        let d = padded("<title>Log in to X / X</title>", "");
        let err = AssetLocator::default().require(&d).unwrap_err();
        assert!(err.to_string().contains("login page"), "{err}");

        let d = padded("<title>X</title>", r#"<div data-testid="LoginForm"></div>"#);
        let err = AssetLocator::default().require(&d).unwrap_err();
        assert!(err.to_string().contains("login page"), "{err}");
    }

    struct Fixed;

    impl AssetMatcher for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn find(&self, _document: &Document) -> Option<String> {
            Some("https://cdn.example/ondemand.s.1.js".to_string())
        }
    }

    #[test]
    fn test_pushed_matcher_is_tried_last() {
        let mut locator = AssetLocator::default();
        locator.push(Fixed);
        assert_eq!(locator.matcher_names(), vec!["script-src", "chunk-map", "fixed"]);

        let d = doc("<html></html>");
        assert_eq!(
            locator.locate(&d).as_deref(),
            Some("https://cdn.example/ondemand.s.1.js")
        );
    }
}
