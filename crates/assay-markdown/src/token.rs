//! Token records emitted by the tokenizer

use assay_core::RawToken;

/// One markdown-it style token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownToken {
    pub kind: String,
    pub nesting: i32,
    pub map: Option<(usize, usize)>,
    pub tag: String,
    pub content: String,
    pub info: String,
    pub markup: String,
    pub attrs: Vec<(String, String)>,
}

impl MarkdownToken {
    pub fn new(kind: impl Into<String>, nesting: i32) -> Self {
        Self {
            kind: kind.into(),
            nesting,
            ..Self::default()
        }
    }

    pub fn with_map(mut self, map: (usize, usize)) -> Self {
        self.map = Some(map);
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

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl RawToken for MarkdownToken {
    fn kind(&self) -> String {
        self.kind.clone()
    }

    fn nesting(&self) -> i32 {
        self.nesting
    }

    fn map(&self) -> Option<(usize, usize)> {
        self.map
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
