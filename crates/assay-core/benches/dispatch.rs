//! Dispatch throughput with several collectors and ignore rules

use assay_core::{
    CappedItems, Collector, CollectorError, CollectorOutput, Deadline, DispatchContext,
    DocumentIndex, Interest, Token, Warehouse, WarehouseConfig,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

struct CountText {
    name: String,
    ignore: Option<&'static str>,
    items: CappedItems<usize>,
}

impl Collector for CountText {
    fn name(&self) -> &str {
        &self.name
    }

    fn interest(&self) -> Interest {
        let interest = Interest::new(["text", "link_open"]);
        match self.ignore {
            Some(kind) => interest.ignoring([kind]),
            None => interest,
        }
    }

    fn on_token(
        &mut self,
        index: usize,
        _token: &Token,
        _ctx: &DispatchContext<'_>,
        _warehouse: &DocumentIndex,
    ) -> Result<(), CollectorError> {
        self.items.push(index);
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

/// Paragraphs alternating with blockquotes, each holding a link
fn tokens(blocks: usize) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(blocks * 10);
    for i in 0..blocks {
        let quoted = i % 2 == 1;
        if quoted {
            tokens.push(Token::new("blockquote_open", 1).with_map(i * 2, i * 2 + 1));
        }
        tokens.push(Token::new("paragraph_open", 1).with_map(i * 2, i * 2 + 1));
        tokens.push(Token::new("inline", 0).with_content("see link"));
        tokens.push(Token::new("text", 0).with_content("see "));
        tokens.push(Token::new("link_open", 1).with_attr("href", "https://example.com"));
        tokens.push(Token::new("text", 0).with_content("link"));
        tokens.push(Token::new("link_close", -1));
        tokens.push(Token::new("paragraph_close", -1));
        if quoted {
            tokens.push(Token::new("blockquote_close", -1));
        }
    }
    tokens
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_all");
    let mut config = WarehouseConfig::default();
    config.caps.custom = usize::MAX;

    for &blocks in &[100usize, 1_000, 10_000] {
        let stream = tokens(blocks);
        group.throughput(Throughput::Elements(stream.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &stream, |b, stream| {
            b.iter(|| {
                let mut warehouse = Warehouse::new(stream, "", config.clone()).unwrap();
                for (name, ignore) in [("all", None), ("no_quotes", Some("blockquote")), ("no_links", Some("link"))] {
                    warehouse
                        .register(CountText {
                            name: name.to_string(),
                            ignore,
                            items: CappedItems::new(config.caps.custom),
                        })
                        .unwrap();
                }
                black_box(warehouse.dispatch_all().unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
