//! Assay core
//!
//! Single-pass token indexing and collector dispatch for untrusted markdown
//! token streams.
//!
//! ## Architecture
//!
//! ```text
//! raw tokens (any RawToken)
//!     │ canonicalize: one read per field, sanitised
//!     ▼
//! DocumentIndex: parents, pairs, children, by-type, sections, fences
//!     │
//!     ▼
//! Warehouse::dispatch_all
//!     ├── RoutingTable: type -> collectors, ignore-subtree bitmask
//!     ├── Collector::on_token for each routed token
//!     └── Collector::finalize under TimeoutGuard
//!     ▼
//! Extraction: name -> { items, count, truncated, max_allowed }
//! ```
//!
//! ## Example
//!
//! ```
//! use assay_core::{Token, Warehouse, WarehouseConfig};
//!
//! let tokens = vec![
//!     Token::new("heading_open", 1).with_tag("h1").with_map(0, 1),
//!     Token::new("inline", 0).with_content("Intro"),
//!     Token::new("heading_close", -1),
//! ];
//! let warehouse = Warehouse::new(&tokens, "# Intro\n", WarehouseConfig::default()).unwrap();
//! assert_eq!(warehouse.section_of(0).unwrap().title, "Intro");
//! ```

pub mod caps;
pub mod collector;
pub mod config;
pub mod error;
pub mod index;
pub mod routing;
pub mod security;
pub mod token;
pub mod warehouse;

pub use caps::{CapKind, CappedItems, CollectorOutput};
pub use collector::{Collector, DispatchContext};
pub use config::{CapsConfig, FaultPolicy, LimitsConfig, TimeoutConfig, TimeoutMode, WarehouseConfig};
pub use error::{CollectorError, ConfigError, WarehouseError, WarehouseResult};
pub use index::{DocumentIndex, Fence, IndexStats, Pair, Section, SectionIndex};
pub use routing::{CollectorId, Interest, RoutingTable};
pub use security::{normalize_url, Deadline, NormalizedUrl, TimeoutGuard};
pub use token::{base_kind, canonicalize, LineRange, RawToken, Token};
pub use warehouse::{CollectorFailure, DispatchStats, Extraction, FailureStage, Warehouse};
