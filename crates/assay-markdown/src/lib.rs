//! Markdown tokenizer adapter
//!
//! Turns markdown source into the flat, markdown-it style token stream that
//! `assay-core` indexes. Parsing is done by `pulldown-cmark`; this crate only
//! reshapes its events:
//!
//! - block tags become `<kind>_open` / `<kind>_close` pairs carrying a
//!   half-open line map on the opener
//! - each run of inline events is preceded by an `inline` token holding the
//!   run's plain text
//! - code blocks, HTML blocks, rules and images are single tokens
//!
//! ```
//! use assay_core::RawToken;
//!
//! let tokens = assay_markdown::tokenize("# Title\n\nBody\n");
//! let kinds: Vec<String> = tokens.iter().map(|t| t.kind()).collect();
//! assert_eq!(kinds[..3], ["heading_open", "inline", "text"]);
//! ```

pub mod lines;
pub mod token;
pub mod tokenizer;

pub use lines::LineIndex;
pub use token::MarkdownToken;
pub use tokenizer::{parser_options, tokenize};
