//! Document index
//!
//! Everything a collector may ask about the document's structure is computed
//! once, in a single pass, when the warehouse is built:
//!
//! ```text
//! DocumentIndex
//! ├── tokens:   Vec<Token>              # canonical records
//! ├── parents:  Vec<Option<usize>>      # token -> enclosing opener
//! ├── pairs:    Vec<Pair>               # (open, close), open < close
//! ├── pair_of:  Vec<Option<usize>>      # both directions
//! ├── children: CSR built from parents
//! ├── by_type:  type -> ascending token indices
//! ├── sections: SectionIndex            # sorted, non-overlapping
//! └── fences:   Vec<Fence>
//! ```
//!
//! The index is never mutated after construction.

pub mod builder;
pub mod sections;

use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;

use crate::token::{LineRange, Token};

pub use builder::IndexBuilder;
pub use sections::{Section, SectionIndex};

/// Matched opening and closing token indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pair {
    pub open: usize,
    pub close: usize,
}

/// Fenced code block inventory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fence {
    pub token_index: usize,
    pub start: usize,
    /// Exclusive
    pub end: usize,
    pub language: String,
    /// Raw info string
    pub info: String,
}

/// Counters gathered while building
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub tokens: usize,
    pub pairs: usize,
    pub sections: usize,
    pub fences: usize,
    pub max_depth: usize,
    /// Dangling closers, implicitly closed openers and out-of-order headings
    pub malformed: usize,
}

/// Read-only query surface over one document
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    tokens: Vec<Token>,
    parents: Vec<Option<usize>>,
    pairs: Vec<Pair>,
    pair_of: Vec<Option<usize>>,
    children_ranges: Vec<(u32, u32)>,
    children_data: Vec<usize>,
    by_type: HashMap<String, Vec<usize>>,
    sections: SectionIndex,
    fences: Vec<Fence>,
    total_lines: usize,
    stats: IndexStats,
}

impl DocumentIndex {
    /// Build all indices from canonical tokens in one pass
    pub fn build(tokens: Vec<Token>, source: &str) -> Self {
        IndexBuilder::new(tokens, source).build()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn token(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens of one type in document order
    pub fn iter_by_type<'a>(&'a self, kind: &str) -> impl Iterator<Item = (usize, &'a Token)> + 'a {
        self.by_type
            .get(kind)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&i| (i, &self.tokens[i]))
    }

    pub fn count_of(&self, kind: &str) -> usize {
        self.by_type.get(kind).map_or(0, Vec::len)
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    /// Matching opener for a closer, matching closer for an opener
    pub fn pair_of(&self, index: usize) -> Option<usize> {
        self.pair_of.get(index).copied().flatten()
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// Direct children in document order. A paired closer is a child of its
    /// opener.
    pub fn children(&self, index: usize) -> &[usize] {
        match self.children_ranges.get(index) {
            Some(&(start, count)) => {
                let start = start as usize;
                &self.children_data[start..start + count as usize]
            }
            None => &[],
        }
    }

    /// Line range of a block. Closing tokens usually carry no map of their
    /// own, so they report their opener's.
    pub fn line_range(&self, index: usize) -> Option<LineRange> {
        let token = self.tokens.get(index)?;
        token.map().or_else(|| {
            if token.is_close() {
                self.pair_of(index).and_then(|open| self.tokens[open].map())
            } else {
                None
            }
        })
    }

    /// Token index range covered by a block: opener through closer for a
    /// paired opener, the token alone otherwise.
    pub fn subtree(&self, index: usize) -> Range<usize> {
        match self.tokens.get(index) {
            Some(token) if token.is_open() => match self.pair_of(index) {
                Some(close) => index..close + 1,
                None => index..index + 1,
            },
            Some(_) => index..index + 1,
            None => index..index,
        }
    }

    /// Plain text of a block's `text` and `code_inline` descendants
    pub fn text_of(&self, index: usize) -> String {
        let mut text = String::new();
        for token in &self.tokens[self.subtree(index)] {
            match token.kind() {
                "text" | "code_inline" => text.push_str(token.content()),
                "softbreak" | "hardbreak" => text.push(' '),
                _ => {}
            }
        }
        text
    }

    /// First line of a token, falling back to the nearest mapped ancestor
    pub fn line_of(&self, index: usize) -> Option<usize> {
        let mut current = Some(index);
        while let Some(i) = current {
            if let Some(range) = self.line_range(i) {
                return Some(range.start);
            }
            current = self.parent(i);
        }
        None
    }

    pub fn section_of(&self, line: usize) -> Option<&Section> {
        self.sections.section_of(line)
    }

    pub fn sections(&self) -> &[Section] {
        self.sections.sections()
    }

    pub fn section_index(&self) -> &SectionIndex {
        &self.sections
    }

    pub fn fences(&self) -> &[Fence] {
        &self.fences
    }

    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> DocumentIndex {
        let tokens = vec![
            Token::new("heading_open", 1).with_map(0, 1).with_tag("h1"),
            Token::new("inline", 0).with_map(0, 1).with_content("Title"),
            Token::new("heading_close", -1),
            Token::new("paragraph_open", 1).with_map(2, 3),
            Token::new("inline", 0).with_map(2, 3).with_content("see link"),
            Token::new("text", 0).with_content("see "),
            Token::new("link_open", 1).with_attr("href", "https://a.example"),
            Token::new("text", 0).with_content("link"),
            Token::new("link_close", -1),
            Token::new("paragraph_close", -1),
        ];
        DocumentIndex::build(tokens, "# Title\n\nsee [link](https://a.example)\n")
    }

    #[test]
    fn test_query_surface() {
        let index = doc();

        assert_eq!(index.len(), 10);
        assert_eq!(index.count_of("text"), 2);
        assert_eq!(
            index.iter_by_type("inline").map(|(i, _)| i).collect::<Vec<_>>(),
            vec![1, 4]
        );
        assert_eq!(index.parent(7), Some(6));
        assert_eq!(index.parent(8), Some(6));
        assert_eq!(index.parent(6), Some(3));
        assert_eq!(index.parent(0), None);
        assert_eq!(index.pair_of(3), Some(9));
        assert_eq!(index.pair_of(9), Some(3));
        assert_eq!(index.children(3), &[4, 5, 6, 9]);
        assert_eq!(index.children(6), &[7, 8]);
        assert_eq!(index.line_range(9), Some(LineRange::new(2, 3)));
        assert_eq!(index.subtree(6), 6..9);
        assert_eq!(index.text_of(3), "see link");
        assert_eq!(index.line_of(7), Some(2));
        assert_eq!(index.total_lines(), 3);
    }

    #[test]
    fn test_out_of_range_queries() {
        let index = doc();
        assert_eq!(index.token(99), None);
        assert_eq!(index.parent(99), None);
        assert_eq!(index.children(99), &[] as &[usize]);
        assert_eq!(index.line_range(99), None);
        assert_eq!(index.subtree(99), 99..99);
        assert_eq!(index.iter_by_type("table_open").count(), 0);
    }
}
