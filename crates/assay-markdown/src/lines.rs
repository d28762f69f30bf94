//! Byte offset to line number mapping

use std::ops::Range;

/// Start offsets of every line in a source text
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    /// Zero-based line containing `offset`
    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset).saturating_sub(1)
    }

    /// Half-open line range covered by a byte range. A trailing newline does
    /// not extend the range onto the next line.
    pub fn map(&self, range: &Range<usize>) -> (usize, usize) {
        let start = self.line_of(range.start);
        let last = self.line_of(range.end.saturating_sub(1).max(range.start));
        (start, last + 1)
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}
