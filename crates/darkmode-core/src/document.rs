//! The page document the agent mutates.
//!
//! `Document` is the narrow slice of a DOM the page agent needs: its
//! location, whether it can be mutated yet, and style elements in the head.
//! `HtmlDocument` implements it over an HTML string so pages can be
//! processed outside a browser.

use url::Url;

use crate::error::{Error, Result};

/// Identifier of the injected style element. Stable across releases so a
/// page never carries two generations of the element.
pub const STYLE_ELEMENT_ID: &str = "dark-mode-pro-style";

const EMPTY_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head>\n</head>\n<body>\n</body>\n</html>\n";

/// Parsed page location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    href: String,
    hostname: String,
    pathname: String,
}

impl Location {
    /// Parse an absolute URL.
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|source| Error::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        Ok(Self {
            href: parsed.as_str().to_string(),
            hostname: parsed.host_str().unwrap_or_default().to_string(),
            pathname: parsed.path().to_string(),
        })
    }

    /// Full (normalized) URL.
    pub fn href(&self) -> &str {
        &self.href
    }

    /// Host name, empty for URLs without a host (`file:`, `about:`).
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn pathname(&self) -> &str {
        &self.pathname
    }
}

/// Minimal document surface used by the page agent.
pub trait Document {
    fn location(&self) -> &Location;

    /// Whether the document can be mutated (the head exists).
    fn is_ready(&self) -> bool;

    /// Append a `<style>` element with the given id and text to the head.
    fn append_style_to_head(&mut self, id: &str, css: &str);

    /// Remove every element with the given id. Returns whether any was removed.
    fn remove_element(&mut self, id: &str) -> bool;

    /// Number of elements carrying the given id.
    fn count_elements(&self, id: &str) -> usize;
}

/// A style element added to the document head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleElement {
    pub id: String,
    pub text: String,
}

/// In-memory HTML document.
///
/// The original markup is kept as-is; injected style elements are tracked
/// separately and spliced into the head by [`HtmlDocument::render`].
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    location: Location,
    source: String,
    styles: Vec<StyleElement>,
    ready: bool,
}

impl HtmlDocument {
    /// Build a document from markup.
    ///
    /// Style elements previously injected under [`STYLE_ELEMENT_ID`] are
    /// stripped, so a rendered page can be loaded again without carrying a
    /// stale copy of the element.
    pub fn from_html(location: Location, html: &str) -> Self {
        Self {
            location,
            source: strip_style_elements(html, STYLE_ELEMENT_ID),
            styles: Vec::new(),
            ready: true,
        }
    }

    /// A blank page at the given location.
    pub fn empty(location: Location) -> Self {
        Self::from_html(location, EMPTY_PAGE)
    }

    /// Mark the document as still loading (or loaded).
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Injected style elements, in insertion order.
    pub fn styles(&self) -> &[StyleElement] {
        &self.styles
    }

    /// Render the markup with injected style elements at the end of the head.
    ///
    /// Falls back to inserting before `<body` and then to the very start when
    /// the markup has no head.
    pub fn render(&self) -> String {
        if self.styles.is_empty() {
            return self.source.clone();
        }

        let injected: String = self
            .styles
            .iter()
            .map(|style| format!("<style id=\"{}\">{}</style>\n", style.id, style.text))
            .collect();

        let lower = self.source.to_ascii_lowercase();
        let at = lower
            .find("</head>")
            .or_else(|| lower.find("<body"))
            .unwrap_or(0);

        let mut out = String::with_capacity(self.source.len() + injected.len());
        out.push_str(&self.source[..at]);
        out.push_str(&injected);
        out.push_str(&self.source[at..]);
        out
    }
}

impl Document for HtmlDocument {
    fn location(&self) -> &Location {
        &self.location
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn append_style_to_head(&mut self, id: &str, css: &str) {
        self.styles.push(StyleElement {
            id: id.to_string(),
            text: css.to_string(),
        });
    }

    fn remove_element(&mut self, id: &str) -> bool {
        let before = self.styles.len();
        self.styles.retain(|style| style.id != id);
        self.styles.len() != before
    }

    fn count_elements(&self, id: &str) -> usize {
        self.styles.iter().filter(|style| style.id == id).count()
    }
}

/// Remove `<style id="...">...</style>` elements with the given id.
///
/// Matching is ASCII case-insensitive on the tags. An unterminated element
/// is removed to the end of the input.
fn strip_style_elements(html: &str, id: &str) -> String {
    let open = format!("<style id=\"{id}\">").to_ascii_lowercase();
    const CLOSE: &str = "</style>";

    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(found) = lower[cursor..].find(&open) {
        let start = cursor + found;
        out.push_str(&html[cursor..start]);

        let body_start = start + open.len();
        cursor = match lower[body_start..].find(CLOSE) {
            Some(end) => {
                let mut next = body_start + end + CLOSE.len();
                // Drop the newline render() writes after the element.
                if html[next..].starts_with('\n') {
                    next += 1;
                }
                next
            }
            None => html.len(),
        };
    }

    out.push_str(&html[cursor..]);
    out
}
