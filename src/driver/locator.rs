//! Element locator strategies.
//!
//! Provides Selenium-like `By` selectors for finding elements.
//!
//! # Example
//!
//! ```ignore
//! use proxied_webdriver::By;
//!
//! let button = driver.find_element(&By::css("button.primary"))?;
//! let form = driver.find_element(&By::id("login-form"))?;
//! let links = driver.find_elements(&By::xpath("//a[@href]"))?;
//! ```
//!
//! W3C endpoints only know five strategies, so id, name and class
//! locators are sent as CSS selectors.

// ============================================================================
// By Enum
// ============================================================================

/// Element locator strategy (like Selenium's `By`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum By {
    /// CSS selector.
    Css(String),
    /// XPath expression.
    XPath(String),
    /// Element id (sent as `#id`).
    Id(String),
    /// Name attribute (sent as `[name="…"]`).
    Name(String),
    /// Single class name (sent as `.class`).
    Class(String),
    /// Tag name.
    Tag(String),
    /// Exact link text of an `<a>` element.
    LinkText(String),
    /// Partial link text of an `<a>` element.
    PartialLinkText(String),
}

impl By {
    /// Creates a CSS selector.
    #[inline]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Creates an XPath selector.
    #[inline]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// Creates an id selector.
    #[inline]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Creates a name attribute selector.
    #[inline]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Creates a class name selector.
    #[inline]
    pub fn class(class: impl Into<String>) -> Self {
        Self::Class(class.into())
    }

    /// Creates a tag name selector.
    #[inline]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag(tag.into())
    }

    /// Creates a link text selector.
    #[inline]
    pub fn link_text(text: impl Into<String>) -> Self {
        Self::LinkText(text.into())
    }

    /// Creates a partial link text selector.
    #[inline]
    pub fn partial_link_text(text: impl Into<String>) -> Self {
        Self::PartialLinkText(text.into())
    }

    /// Returns the `(using, value)` pair sent to the remote end.
    #[must_use]
    pub fn to_w3c(&self) -> (&'static str, String) {
        match self {
            Self::Css(s) => ("css selector", s.clone()),
            Self::XPath(s) => ("xpath", s.clone()),
            Self::Id(s) => ("css selector", format!("#{}", escape_ident(s))),
            Self::Name(s) => ("css selector", format!("[name=\"{}\"]", escape_css(s))),
            Self::Class(s) => ("css selector", format!(".{}", escape_ident(s))),
            Self::Tag(s) => ("tag name", s.clone()),
            Self::LinkText(s) => ("link text", s.clone()),
            Self::PartialLinkText(s) => ("partial link text", s.clone()),
        }
    }
}

/// Escapes a bare CSS identifier.
///
/// A digit may not open an identifier, nor follow a leading `-`; it is
/// written as a code point escape (`1a` becomes `\31 a`).
fn escape_ident(raw: &str) -> String {
    let mut chars = raw.chars();
    let mut escaped = String::with_capacity(raw.len() + 4);

    match (chars.next(), chars.next()) {
        (Some(first), _) if first.is_ascii_digit() => {
            escaped.push_str(&format!("\\{:x} ", u32::from(first)));
            escaped.push_str(&escape_css(&raw[1..]));
        }
        (Some('-'), Some(second)) if second.is_ascii_digit() => {
            escaped.push_str(&format!("-\\{:x} ", u32::from(second)));
            escaped.push_str(&escape_css(&raw[2..]));
        }
        _ => escaped.push_str(&escape_css(raw)),
    }

    escaped
}

/// Backslash-escapes characters with meaning in CSS selectors.
fn escape_css(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ============================================================================
// Tests
// ============================================================================
