//! Hyperlinks

use assay_core::{
    normalize_url, CapKind, CappedItems, CapsConfig, Collector, CollectorError, CollectorOutput,
    Deadline, DispatchContext, DocumentIndex, Interest, Token,
};
use serde::Serialize;

use crate::section_at;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub url: String,
    pub text: String,
    pub line: Option<usize>,
    pub section: Option<usize>,
}

/// Collects `link_open` targets. Links whose URL is not allowed are dropped.
pub struct LinksCollector {
    items: CappedItems<Link>,
    dropped: usize,
}

impl LinksCollector {
    pub fn new(caps: &CapsConfig) -> Self {
        Self {
            items: CappedItems::new(caps.for_kind(CapKind::Links)),
            dropped: 0,
        }
    }
}

impl Collector for LinksCollector {
    fn name(&self) -> &str {
        "links"
    }

    fn interest(&self) -> Interest {
        Interest::new(["link_open"])
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

        let Some(url) = normalize_url(token.attr("href").unwrap_or_default()).into_allowed() else {
            self.dropped += 1;
            return Ok(());
        };
        let line = warehouse.line_of(index);
        self.items.push(Link {
            url,
            text: warehouse.text_of(index),
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
            tracing::debug!(dropped = self.dropped, "Dropped links with disallowed URLs");
        }
        Ok(self.items.take_output().map_err(anyhow::Error::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assay_core::{Warehouse, WarehouseConfig};
    use tracing_test::traced_test;

    fn link(href: &str, text: &str) -> [Token; 3] {
        [
            Token::new("link_open", 1).with_attr("href", href),
            Token::new("text", 0).with_content(text),
            Token::new("link_close", -1),
        ]
    }

    #[traced_test]
    #[test]
    fn test_disallowed_urls_dropped() {
        let mut tokens = vec![Token::new("paragraph_open", 1).with_map(0, 1)];
        tokens.extend(link("HTTPS://Example.com/a", "ok"));
        tokens.extend(link("JaVaScRiPt:alert(1)", "xss"));
        tokens.extend(link("irc://chat.example", "unknown"));
        tokens.extend(link("", "empty"));
        tokens.push(Token::new("paragraph_close", -1));

        let mut warehouse = Warehouse::new(&tokens, "x\n", WarehouseConfig::strict()).unwrap();
        warehouse
            .register(LinksCollector::new(&CapsConfig::default()))
            .unwrap();
        let output = &warehouse.dispatch_all().unwrap().results["links"];

        assert_eq!(output.count, 1);
        assert_eq!(output.items[0]["url"], "https://example.com/a");
        assert_eq!(output.items[0]["text"], "ok");
        assert_eq!(output.items[0]["line"], 0);
        assert!(output.items[0]["section"].is_null());
        assert!(logs_contain("Dropped links with disallowed URLs"));
    }
}
