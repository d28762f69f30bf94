//! Per-kind item ceilings
//!
//! A small markdown document can expand into a very large amount of extracted
//! data. Every collector stores its items in [`CappedItems`], which refuses new
//! items once the kind's ceiling is reached and remembers that it did.

use serde::Serialize;
use serde_json::Value;

/// Extraction kind, each with its own ceiling in [`CapsConfig`](crate::config::CapsConfig)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapKind {
    Links,
    Images,
    Headings,
    CodeBlocks,
    Tables,
    ListItems,
    Custom,
}

/// Bounded item buffer
#[derive(Debug, Clone)]
pub struct CappedItems<T> {
    items: Vec<T>,
    max_allowed: usize,
    truncated: bool,
}

impl<T> CappedItems<T> {
    pub fn new(max_allowed: usize) -> Self {
        Self {
            items: Vec::new(),
            max_allowed,
            truncated: false,
        }
    }

    /// Append unless the ceiling is reached. Returns whether the item was kept.
    pub fn push(&mut self, item: T) -> bool {
        if self.items.len() >= self.max_allowed {
            self.truncated = true;
            return false;
        }
        self.items.push(item);
        true
    }

    /// True once no further item can be kept. Collectors use this to skip
    /// building items that would be discarded.
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_allowed
    }

    /// Record that an item was refused without constructing it
    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn max_allowed(&self) -> usize {
        self.max_allowed
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }
}

impl<T: Serialize> CappedItems<T> {
    /// Drain into the uniform finalize shape
    pub fn take_output(&mut self) -> Result<CollectorOutput, serde_json::Error> {
        let items = std::mem::take(&mut self.items)
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CollectorOutput {
            count: items.len(),
            items,
            truncated: self.truncated,
            max_allowed: self.max_allowed,
        })
    }
}

/// Result of `Collector::finalize`
///
/// `truncated` distinguishes a legitimately small result from a capped one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectorOutput {
    pub items: Vec<Value>,
    pub count: usize,
    pub truncated: bool,
    pub max_allowed: usize,
}
