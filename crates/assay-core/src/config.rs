//! Warehouse configuration
//!
//! Every field has a default so an empty TOML document is a valid config.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::caps::CapKind;
use crate::error::ConfigError;

/// How collector failures are handled during dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Return the first collector error to the caller; panics propagate
    Strict,
    /// Log, record, drop the failing collector and keep going
    #[default]
    Lenient,
}

/// Enforcement level of the finalize timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutMode {
    /// No timeout
    Off,
    /// Deadline checked against the clock; overruns detected after the fact
    Cooperative,
    /// Kernel interval timer raises the expiry flag asynchronously (unix)
    #[default]
    Preemptive,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub fault_policy: FaultPolicy,
    pub timeout: TimeoutConfig,
    pub limits: LimitsConfig,
    pub caps: CapsConfig,
}

impl WarehouseConfig {
    /// Parse a TOML document; missing fields keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Configuration for test harnesses: strict fault policy
    pub fn strict() -> Self {
        Self {
            fault_policy: FaultPolicy::Strict,
            ..Self::default()
        }
    }
}

/// Finalize timeout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub mode: TimeoutMode,
    /// Budget per `finalize()` call in milliseconds
    pub budget_ms: u64,
}

impl TimeoutConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            mode: TimeoutMode::default(),
            budget_ms: 2_000,
        }
    }
}

/// Input admission limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted source text
    pub max_source_bytes: usize,
    /// Largest accepted token stream
    pub max_tokens: usize,
    /// Per-string ceiling for every token field and attribute; longer values are cut
    pub max_content_bytes: usize,
    /// Per-token attribute ceiling; extra attributes are dropped
    pub max_attrs_per_token: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_source_bytes: 10 * 1024 * 1024,
            max_tokens: 2_000_000,
            max_content_bytes: 1024 * 1024,
            max_attrs_per_token: 32,
        }
    }
}

/// Per-kind item ceilings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapsConfig {
    pub links: usize,
    pub images: usize,
    pub headings: usize,
    pub code_blocks: usize,
    pub tables: usize,
    pub list_items: usize,
    pub custom: usize,
}

impl Default for CapsConfig {
    fn default() -> Self {
        Self {
            links: 10_000,
            images: 5_000,
            headings: 5_000,
            code_blocks: 2_000,
            tables: 500,
            list_items: 20_000,
            custom: 10_000,
        }
    }
}

impl CapsConfig {
    pub fn for_kind(&self, kind: CapKind) -> usize {
        match kind {
            CapKind::Links => self.links,
            CapKind::Images => self.images,
            CapKind::Headings => self.headings,
            CapKind::CodeBlocks => self.code_blocks,
            CapKind::Tables => self.tables,
            CapKind::ListItems => self.list_items,
            CapKind::Custom => self.custom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = WarehouseConfig::from_toml_str("").unwrap();
        assert_eq!(config, WarehouseConfig::default());
        assert_eq!(config.fault_policy, FaultPolicy::Lenient);
    }

    #[test]
    fn test_partial_toml() {
        let config = WarehouseConfig::from_toml_str(
            r#"
fault_policy = "strict"

[timeout]
mode = "cooperative"
budget_ms = 250

[caps]
links = 3
"#,
        )
        .unwrap();

        assert_eq!(config.fault_policy, FaultPolicy::Strict);
        assert_eq!(config.timeout.mode, TimeoutMode::Cooperative);
        assert_eq!(config.timeout.budget(), Duration::from_millis(250));
        assert_eq!(config.caps.for_kind(CapKind::Links), 3);
        assert_eq!(config.caps.headings, CapsConfig::default().headings);
    }

    #[test]
    fn test_invalid_toml() {
        let err = WarehouseConfig::from_toml_str("fault_policy = \"sometimes\"").unwrap_err();
        assert!(err.to_string().starts_with("Config parse error"));
    }
}
