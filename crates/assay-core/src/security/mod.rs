//! Hostile-input defences: URL normalization and collector timeouts

pub mod timeout;
pub mod url;

pub use timeout::{preemptive_supported, Deadline, TimeoutGuard};
pub use url::{normalize_url, NormalizedUrl};
