//! Built-in collectors and the one-call markdown extraction entry point
//!
//! Every collector is cap-bounded (see [`CapsConfig`]) and passes URLs
//! through [`normalize_url`](assay_core::normalize_url) before storing them.
//!
//! ```
//! use assay_collectors::extract_markdown;
//! use assay_core::WarehouseConfig;
//!
//! let extraction = extract_markdown("# Hi\n\n[a](https://example.com)\n", &WarehouseConfig::default()).unwrap();
//! assert_eq!(extraction.results["links"].count, 1);
//! assert_eq!(extraction.results["headings"].items[0]["anchor"], "hi");
//! ```

pub mod code_blocks;
pub mod headings;
pub mod images;
pub mod links;
pub mod list_items;
pub mod tables;

use assay_core::{
    Collector, CapsConfig, DocumentIndex, Extraction, Warehouse, WarehouseConfig, WarehouseError,
    WarehouseResult,
};

pub use code_blocks::CodeBlocksCollector;
pub use headings::{HeadingsCollector, Slugger};
pub use images::ImagesCollector;
pub use links::LinksCollector;
pub use list_items::ListItemsCollector;
pub use tables::TablesCollector;

/// The built-in set, in registration order
pub fn default_collectors(caps: &CapsConfig) -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(LinksCollector::new(caps)),
        Box::new(ImagesCollector::new(caps)),
        Box::new(HeadingsCollector::new(caps)),
        Box::new(CodeBlocksCollector::new(caps)),
        Box::new(TablesCollector::new(caps)),
        Box::new(ListItemsCollector::new(caps)),
    ]
}

/// Tokenize, index and run the built-in collectors over one document
pub fn extract_markdown(source: &str, config: &WarehouseConfig) -> WarehouseResult<Extraction> {
    let max = config.limits.max_source_bytes;
    if source.len() > max {
        return Err(WarehouseError::DocumentTooLarge {
            size: source.len(),
            max,
        });
    }

    let tokens = assay_markdown::tokenize(source);
    let mut warehouse = Warehouse::new(&tokens, source, config.clone())?;
    for collector in default_collectors(&config.caps) {
        warehouse.register_collector(collector)?;
    }
    warehouse.dispatch_all()
}

/// Id of the section containing a line
pub(crate) fn section_at(index: &DocumentIndex, line: Option<usize>) -> Option<usize> {
    line.and_then(|line| index.section_of(line)).map(|s| s.id)
}
