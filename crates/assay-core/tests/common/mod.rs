//! Shared collectors and token streams for integration tests

#![allow(dead_code)]

use assay_core::{
    CapKind, CappedItems, Collector, CollectorError, CollectorOutput, Deadline, DispatchContext,
    DocumentIndex, Interest, Token, WarehouseConfig,
};

/// `# A` / paragraph / `> quote` / `## B` with a fenced block
pub fn sample_tokens() -> Vec<Token> {
    vec![
        Token::new("heading_open", 1).with_tag("h1").with_map(0, 1),
        Token::new("inline", 0).with_content("A").with_map(0, 1),
        Token::new("text", 0).with_content("A"),
        Token::new("heading_close", -1).with_tag("h1"),
        Token::new("paragraph_open", 1).with_map(2, 3),
        Token::new("inline", 0).with_content("one").with_map(2, 3),
        Token::new("text", 0).with_content("one"),
        Token::new("paragraph_close", -1),
        Token::new("blockquote_open", 1).with_map(4, 5),
        Token::new("paragraph_open", 1).with_map(4, 5),
        Token::new("inline", 0).with_content("quoted").with_map(4, 5),
        Token::new("text", 0).with_content("quoted"),
        Token::new("paragraph_close", -1),
        Token::new("blockquote_close", -1),
        Token::new("heading_open", 1).with_tag("h2").with_map(6, 7),
        Token::new("inline", 0).with_content("B").with_map(6, 7),
        Token::new("text", 0).with_content("B"),
        Token::new("heading_close", -1).with_tag("h2"),
        Token::new("fence", 0)
            .with_info("rust")
            .with_content("fn main() {}\n")
            .with_map(8, 11),
    ]
}

pub const SAMPLE_SOURCE: &str = "# A\n\none\n\n> quoted\n\n## B\n\n```rust\nfn main() {}\n```\n";

/// Collects the content of every routed `text` token
pub struct TextCollector {
    name: String,
    interest: Interest,
    items: CappedItems<String>,
}

impl TextCollector {
    pub fn new(name: &str) -> Self {
        Self::with_interest(name, Interest::new(["text"]))
    }

    pub fn with_interest(name: &str, interest: Interest) -> Self {
        Self {
            name: name.to_string(),
            interest,
            items: CappedItems::new(WarehouseConfig::default().caps.for_kind(CapKind::Custom)),
        }
    }

    pub fn capped(name: &str, max: usize) -> Self {
        Self {
            name: name.to_string(),
            interest: Interest::new(["text"]),
            items: CappedItems::new(max),
        }
    }
}

impl Collector for TextCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn interest(&self) -> Interest {
        self.interest.clone()
    }

    fn on_token(
        &mut self,
        _index: usize,
        token: &Token,
        _ctx: &DispatchContext<'_>,
        _warehouse: &DocumentIndex,
    ) -> Result<(), CollectorError> {
        if self.items.is_full() {
            self.items.mark_truncated();
            return Ok(());
        }
        self.items.push(token.content().to_string());
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

/// How a [`FaultyCollector`] misbehaves
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    ErrorOnToken,
    PanicOnToken,
    ErrorOnFinalize,
    PanicOnFinalize,
    SpinInFinalize,
    SleepInFinalize,
}

pub struct FaultyCollector {
    name: String,
    fault: Fault,
}

impl FaultyCollector {
    pub fn new(name: &str, fault: Fault) -> Self {
        Self {
            name: name.to_string(),
            fault,
        }
    }
}

impl Collector for FaultyCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn interest(&self) -> Interest {
        Interest::new(["text"])
    }

    fn on_token(
        &mut self,
        _index: usize,
        _token: &Token,
        _ctx: &DispatchContext<'_>,
        _warehouse: &DocumentIndex,
    ) -> Result<(), CollectorError> {
        match self.fault {
            Fault::ErrorOnToken => Err(CollectorError::failed("bad token")),
            Fault::PanicOnToken => panic!("collector bug"),
            _ => Ok(()),
        }
    }

    fn finalize(
        &mut self,
        _warehouse: &DocumentIndex,
        deadline: &Deadline,
    ) -> Result<CollectorOutput, CollectorError> {
        match self.fault {
            Fault::ErrorOnFinalize => return Err(CollectorError::failed("bad finalize")),
            Fault::PanicOnFinalize => panic!("finalize bug"),
            Fault::SpinInFinalize => loop {
                deadline.check()?;
                std::hint::spin_loop();
            },
            Fault::SleepInFinalize => std::thread::sleep(std::time::Duration::from_millis(60)),
            _ => {}
        }
        Ok(CappedItems::<String>::new(1).take_output().map_err(anyhow::Error::from)?)
    }
}
