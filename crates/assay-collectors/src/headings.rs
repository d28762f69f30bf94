//! Headings with unique anchors
//!
//! Headings quoted inside a blockquote are not part of the document outline
//! and are skipped.

use assay_core::{
    CapKind, CappedItems, CapsConfig, Collector, CollectorError, CollectorOutput, Deadline,
    DispatchContext, DocumentIndex, Interest, Token,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::section_at;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub anchor: String,
    pub line: Option<usize>,
    pub section: Option<usize>,
}

/// GitHub-style anchor generator: lowercase, punctuation dropped, spaces to
/// hyphens, repeats suffixed `-1`, `-2`, ...
#[derive(Debug, Default)]
pub struct Slugger {
    seen: HashMap<String, usize>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slug(&mut self, text: &str) -> String {
        let base: String = text
            .trim()
            .chars()
            .filter_map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    Some(c.to_lowercase().collect::<String>())
                } else if c.is_whitespace() {
                    Some("-".to_string())
                } else {
                    None
                }
            })
            .collect();

        let mut candidate = base.clone();
        while let Some(count) = self.seen.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{base}-{count}");
        }
        self.seen.insert(candidate.clone(), 0);
        candidate
    }
}

pub struct HeadingsCollector {
    items: CappedItems<Heading>,
    slugger: Slugger,
}

impl HeadingsCollector {
    pub fn new(caps: &CapsConfig) -> Self {
        Self {
            items: CappedItems::new(caps.for_kind(CapKind::Headings)),
            slugger: Slugger::new(),
        }
    }
}

impl Collector for HeadingsCollector {
    fn name(&self) -> &str {
        "headings"
    }

    fn interest(&self) -> Interest {
        Interest::new(["heading_open"]).ignoring(["blockquote_open"])
    }

    fn on_token(
        &mut self,
        index: usize,
        token: &Token,
        _ctx: &DispatchContext<'_>,
        warehouse: &DocumentIndex,
    ) -> Result<(), CollectorError> {
        if self.items.is_full() {
            self.items.mark_truncated();
            return Ok(());
        }

        let text = warehouse.text_of(index);
        let line = warehouse.line_of(index);
        self.items.push(Heading {
            level: token.heading_level(),
            anchor: self.slugger.slug(&text),
            text,
            line,
            section: section_at(warehouse, line),
        });
        Ok(())
    }

    fn finalize(
        &mut self,
        _warehouse: &DocumentIndex,
        _deadline: &Deadline,
    ) -> Result<CollectorOutput, CollectorError> {
        Ok(self.items.take_output().map_err(anyhow::Error::from)?)
    }
}
