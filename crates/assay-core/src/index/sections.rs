//! Sections and the section locator
//!
//! Sections are built once by the index builder and never change. The start
//! line array used by [`SectionIndex::section_of`] is computed alongside them.

use serde::Serialize;

/// Line range owned by one heading, up to the next heading or document end
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub id: usize,
    pub start_line: usize,
    /// Inclusive
    pub end_line: usize,
    pub level: u8,
    pub title: String,
    /// Token index of the `heading_open`
    pub heading_index: usize,
    /// Enclosing section by heading level
    pub parent: Option<usize>,
}

impl Section {
    pub fn contains(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}

/// Sorted, non-overlapping sections with O(log H) lookup
#[derive(Debug, Clone, Default)]
pub struct SectionIndex {
    sections: Vec<Section>,
    starts: Vec<usize>,
}

impl SectionIndex {
    /// `sections` must be sorted by strictly increasing `start_line`
    pub(crate) fn new(sections: Vec<Section>) -> Self {
        let starts = sections.iter().map(|s| s.start_line).collect();
        Self { sections, starts }
    }

    /// Section containing `line`, if any.
    ///
    /// Bisect-right over the start lines, minus one.
    pub fn section_of(&self, line: usize) -> Option<&Section> {
        let idx = self.starts.partition_point(|&start| start <= line);
        if idx == 0 {
            return None;
        }
        let section = &self.sections[idx - 1];
        section.contains(line).then_some(section)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn get(&self, id: usize) -> Option<&Section> {
        self.sections.get(id)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
