//! Canonical token records and the ingestion boundary
//!
//! Tokenizers hand us objects we do not control. [`canonicalize`] reads every
//! field of every raw token exactly once and copies it into a plain [`Token`].
//! From that point on nothing in the crate holds a reference to the raw
//! objects, so no collector can ever trigger an accessor on them.

use serde::Serialize;

use crate::config::LimitsConfig;

/// Accessor surface of a tokenizer's token object.
///
/// Implementations may be arbitrarily expensive or have side effects; the
/// canonicalizer calls each method once per token and never again.
pub trait RawToken {
    /// Token type, e.g. `heading_open`, `inline`, `fence`
    fn kind(&self) -> String;
    /// Nesting delta: `1` opens a block, `-1` closes one, `0` is self-contained
    fn nesting(&self) -> i32;
    /// Half-open `[start, end)` line range, if the tokenizer tracked one
    fn map(&self) -> Option<(usize, usize)>;
    /// HTML tag name (`h2`, `p`, `code`, ...)
    fn tag(&self) -> String;
    /// Text content
    fn content(&self) -> String;
    /// Fence info string
    fn info(&self) -> String;
    /// Markup characters (`#`, `` ``` ``, `*`, ...)
    fn markup(&self) -> String;
    /// Attributes in tokenizer order
    fn attrs(&self) -> Vec<(String, String)>;
}

/// Half-open line range `[start, end)` as produced by the tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Last line covered by the range (inclusive)
    pub fn last_line(&self) -> usize {
        self.end.saturating_sub(1).max(self.start)
    }

    pub fn contains(&self, line: usize) -> bool {
        line >= self.start && line < self.end
    }
}

/// Immutable, behaviour-free token record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    kind: String,
    nesting: i8,
    map: Option<LineRange>,
    tag: String,
    content: String,
    info: String,
    markup: String,
    attrs: Vec<(String, String)>,
}

impl Token {
    /// Build a token directly. Used by tests and by tokenizers that already
    /// produce plain data.
    pub fn new(kind: impl Into<String>, nesting: i32) -> Self {
        Self {
            kind: kind.into(),
            nesting: clamp_nesting(nesting),
            map: None,
            tag: String::new(),
            content: String::new(),
            info: String::new(),
            markup: String::new(),
            attrs: Vec::new(),
        }
    }

    pub fn with_map(mut self, start: usize, end: usize) -> Self {
        self.map = Some(LineRange::new(start, end));
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = markup.into();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn nesting(&self) -> i8 {
        self.nesting
    }

    pub fn is_open(&self) -> bool {
        self.nesting > 0
    }

    pub fn is_close(&self) -> bool {
        self.nesting < 0
    }

    pub fn map(&self) -> Option<LineRange> {
        self.map
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    /// First attribute with the given name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Type name with any `_open` / `_close` suffix removed
    pub fn base_kind(&self) -> &str {
        base_kind(&self.kind)
    }

    /// Heading level from the `hN` tag, falling back to the markup length
    pub fn heading_level(&self) -> u8 {
        let from_tag = self
            .tag
            .strip_prefix('h')
            .and_then(|n| n.parse::<u8>().ok());
        let level = from_tag.unwrap_or_else(|| {
            let hashes = self.markup.chars().take_while(|&c| c == '#').count();
            hashes.clamp(1, 6) as u8
        });
        level.clamp(1, 6)
    }
}

/// `heading_open` and `heading_close` both map to `heading`
pub fn base_kind(kind: &str) -> &str {
    kind.strip_suffix("_open")
        .or_else(|| kind.strip_suffix("_close"))
        .unwrap_or(kind)
}

fn clamp_nesting(nesting: i32) -> i8 {
    nesting.signum() as i8
}

fn truncate_at_char_boundary(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
    s
}

/// Copy one raw token into a canonical record.
///
/// Each accessor is called exactly once. Every string, attribute names and
/// values included, is cut to `max_content_bytes`.
pub fn canonicalize_one<R: RawToken + ?Sized>(raw: &R, limits: &LimitsConfig) -> Token {
    let max = limits.max_content_bytes;
    let kind = truncate_at_char_boundary(raw.kind(), max);
    let nesting = clamp_nesting(raw.nesting());
    let map = raw.map().map(|(start, end)| LineRange::new(start, end));
    let tag = truncate_at_char_boundary(raw.tag(), max);
    let content = truncate_at_char_boundary(raw.content(), max);
    let info = truncate_at_char_boundary(raw.info(), max);
    let markup = truncate_at_char_boundary(raw.markup(), max);
    let mut attrs = raw.attrs();
    attrs.truncate(limits.max_attrs_per_token);
    let attrs = attrs
        .into_iter()
        .map(|(name, value)| {
            (
                truncate_at_char_boundary(name, max),
                truncate_at_char_boundary(value, max),
            )
        })
        .collect();

    Token {
        kind,
        nesting,
        map,
        tag,
        content,
        info,
        markup,
        attrs,
    }
}

/// Canonicalize a whole token stream
pub fn canonicalize<R: RawToken>(raw: &[R], limits: &LimitsConfig) -> Vec<Token> {
    raw.iter().map(|t| canonicalize_one(t, limits)).collect()
}

impl RawToken for Token {
    fn kind(&self) -> String {
        self.kind.clone()
    }

    fn nesting(&self) -> i32 {
        self.nesting as i32
    }

    fn map(&self) -> Option<(usize, usize)> {
        self.map.map(|r| (r.start, r.end))
    }

    fn tag(&self) -> String {
        self.tag.clone()
    }

    fn content(&self) -> String {
        self.content.clone()
    }

    fn info(&self) -> String {
        self.info.clone()
    }

    fn markup(&self) -> String {
        self.markup.clone()
    }

    fn attrs(&self) -> Vec<(String, String)> {
        self.attrs.clone()
    }
}
