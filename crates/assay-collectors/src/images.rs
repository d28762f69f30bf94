//! Images

use assay_core::{
    normalize_url, CapKind, CappedItems, CapsConfig, Collector, CollectorError, CollectorOutput,
    Deadline, DispatchContext, DocumentIndex, Interest, Token,
};
use serde::Serialize;

use crate::section_at;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub src: String,
    pub alt: String,
    pub title: Option<String>,
    pub line: Option<usize>,
    pub section: Option<usize>,
}

pub struct ImagesCollector {
    items: CappedItems<Image>,
    dropped: usize,
}

impl ImagesCollector {
    pub fn new(caps: &CapsConfig) -> Self {
        Self {
            items: CappedItems::new(caps.for_kind(CapKind::Images)),
            dropped: 0,
        }
    }
}

impl Collector for ImagesCollector {
    fn name(&self) -> &str {
        "images"
    }

    fn interest(&self) -> Interest {
        Interest::new(["image"])
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

        let Some(src) = normalize_url(token.attr("src").unwrap_or_default()).into_allowed() else {
            self.dropped += 1;
            return Ok(());
        };
        let line = warehouse.line_of(index);
        self.items.push(Image {
            src,
            alt: token.content().to_string(),
            title: token.attr("title").map(str::to_string),
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
        if self.dropped > 0 {
            tracing::debug!(dropped = self.dropped, "Dropped images with disallowed URLs");
        }
        Ok(self.items.take_output().map_err(anyhow::Error::from)?)
    }
}
