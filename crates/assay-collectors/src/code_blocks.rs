//! Fenced and indented code blocks

use assay_core::{
    CapKind, CappedItems, CapsConfig, Collector, CollectorError, CollectorOutput, Deadline,
    DispatchContext, DocumentIndex, Interest, Token,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    /// Language from the fence info string; `None` for indented blocks and
    /// bare fences
    pub language: Option<String>,
    pub info: String,
    pub start_line: Option<usize>,
    /// Inclusive
    pub end_line: Option<usize>,
    pub content: String,
}

pub struct CodeBlocksCollector {
    items: CappedItems<CodeBlock>,
}

impl CodeBlocksCollector {
    pub fn new(caps: &CapsConfig) -> Self {
        Self {
            items: CappedItems::new(caps.for_kind(CapKind::CodeBlocks)),
        }
    }
}

impl Collector for CodeBlocksCollector {
    fn name(&self) -> &str {
        "code_blocks"
    }

    fn interest(&self) -> Interest {
        Interest::new(["fence", "code_block"])
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

        // The fence inventory already holds the parsed language
        let language = warehouse
            .fences()
            .binary_search_by_key(&index, |f| f.token_index)
            .ok()
            .map(|i| warehouse.fences()[i].language.clone())
            .filter(|lang| !lang.is_empty());
        let range = warehouse.line_range(index);

        self.items.push(CodeBlock {
            language,
            info: token.info().to_string(),
            start_line: range.map(|r| r.start),
            end_line: range.map(|r| r.last_line()),
            content: token.content().to_string(),
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
