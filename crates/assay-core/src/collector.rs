//! Collector contract
//!
//! A collector subscribes to token types, accumulates items while the
//! dispatcher walks the document, and turns them into one named
//! [`CollectorOutput`] in `finalize`. Collectors are created per document and
//! dropped after finalizing.

use crate::caps::CollectorOutput;
use crate::error::CollectorError;
use crate::index::DocumentIndex;
use crate::routing::Interest;
use crate::security::timeout::Deadline;
use crate::token::{base_kind, Token};

/// Pluggable extractor
pub trait Collector {
    /// Key of this collector's result in the aggregated output
    fn name(&self) -> &str;

    /// Token types to receive and block types to skip
    fn interest(&self) -> Interest;

    /// Optional per-token filter consulted after ignore rules
    fn should_process(&self, _index: usize, _token: &Token, _ctx: &DispatchContext<'_>) -> bool {
        true
    }

    /// Receive one routed token
    fn on_token(
        &mut self,
        index: usize,
        token: &Token,
        ctx: &DispatchContext<'_>,
        warehouse: &DocumentIndex,
    ) -> Result<(), CollectorError>;

    /// Produce the result. Long-running collectors should poll
    /// `deadline.check()`.
    fn finalize(
        &mut self,
        warehouse: &DocumentIndex,
        deadline: &Deadline,
    ) -> Result<CollectorOutput, CollectorError>;
}

/// Position of the dispatcher when a token is delivered
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    open_blocks: &'a [usize],
    index: &'a DocumentIndex,
}

impl<'a> DispatchContext<'a> {
    pub(crate) fn new(open_blocks: &'a [usize], index: &'a DocumentIndex) -> Self {
        Self { open_blocks, index }
    }

    /// Enclosing openers, outermost first. For a closer, its own opener is
    /// the last entry.
    pub fn open_blocks(&self) -> &'a [usize] {
        self.open_blocks
    }

    pub fn depth(&self) -> usize {
        self.open_blocks.len()
    }

    /// Whether an enclosing block has the given type (`list_item_open` and
    /// `list_item` are equivalent)
    pub fn is_inside(&self, kind: &str) -> bool {
        let wanted = base_kind(kind);
        self.open_blocks
            .iter()
            .any(|&i| self.index.tokens()[i].base_kind() == wanted)
    }

    /// How many enclosing blocks have the given type
    pub fn count_inside(&self, kind: &str) -> usize {
        let wanted = base_kind(kind);
        self.open_blocks
            .iter()
            .filter(|&&i| self.index.tokens()[i].base_kind() == wanted)
            .count()
    }
}
