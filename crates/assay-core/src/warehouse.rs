//! Warehouse: per-document indexing and dispatch
//!
//! A warehouse owns one document's canonical tokens and indices plus the
//! collectors registered for it. [`Warehouse::dispatch_all`] closes
//! registration, walks the tokens once feeding each to its routed collectors,
//! then finalizes every collector under the timeout guard.
//!
//! ```text
//! raw tokens ──canonicalize──▶ Vec<Token> ──build──▶ DocumentIndex
//!                                                        │
//! register_collector* ──▶ dispatch_all ──▶ on_token* ──▶ finalize ──▶ Extraction
//! ```
//!
//! One warehouse per document. Parallelism comes from building independent
//! warehouses, never from sharing one.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};

use crate::caps::CollectorOutput;
use crate::collector::{Collector, DispatchContext};
use crate::config::{FaultPolicy, WarehouseConfig};
use crate::error::{CollectorError, WarehouseError, WarehouseResult};
use crate::index::{DocumentIndex, Fence, Section};
use crate::routing::{CollectorId, Interest, OpenMask, RoutingTable, MAX_IGNORE_TYPES};
use crate::security::timeout::TimeoutGuard;
use crate::token::{base_kind, canonicalize, LineRange, RawToken, Token};

struct Registered {
    collector: Box<dyn Collector>,
    name: String,
    interest: Interest,
    failed: bool,
}

enum Registry {
    Open(Vec<Registered>),
    Closed,
}

/// Where a collector failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Dispatch,
    Finalize,
}

/// A collector dropped under the lenient fault policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectorFailure {
    pub collector: String,
    pub stage: FailureStage,
    pub timed_out: bool,
    pub message: String,
}

/// Counters for one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub tokens: usize,
    pub delivered: usize,
    pub skipped_ignored: usize,
    pub skipped_predicate: usize,
}

/// Aggregated result of one document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub results: BTreeMap<String, CollectorOutput>,
    pub failures: Vec<CollectorFailure>,
    pub stats: DispatchStats,
}

impl Extraction {
    pub fn get(&self, name: &str) -> Option<&CollectorOutput> {
        self.results.get(name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Indexing and dispatch engine for one document
pub struct Warehouse {
    index: DocumentIndex,
    config: WarehouseConfig,
    registry: Registry,
}

impl Warehouse {
    /// Canonicalize `raw` and build every index.
    ///
    /// `source` is only used for size admission and the total line count.
    pub fn new<R: RawToken>(raw: &[R], source: &str, config: WarehouseConfig) -> WarehouseResult<Self> {
        let limits = &config.limits;
        if source.len() > limits.max_source_bytes {
            return Err(WarehouseError::DocumentTooLarge {
                size: source.len(),
                max: limits.max_source_bytes,
            });
        }
        if raw.len() > limits.max_tokens {
            return Err(WarehouseError::TooManyTokens {
                count: raw.len(),
                max: limits.max_tokens,
            });
        }

        let tokens = canonicalize(raw, limits);
        let index = DocumentIndex::build(tokens, source);

        Ok(Self {
            index,
            config,
            registry: Registry::Open(Vec::new()),
        })
    }

    /// Register a collector. Fails once dispatch has started.
    pub fn register_collector(&mut self, collector: Box<dyn Collector>) -> WarehouseResult<CollectorId> {
        let name = collector.name().to_string();
        let Registry::Open(registered) = &mut self.registry else {
            return Err(WarehouseError::RegistrationClosed { name });
        };
        if registered.iter().any(|r| r.name == name) {
            return Err(WarehouseError::DuplicateCollector { name });
        }

        let interest = collector.interest();
        let ignored: HashSet<&str> = registered
            .iter()
            .flat_map(|r| r.interest.ignore_inside.iter())
            .chain(interest.ignore_inside.iter())
            .map(|t| base_kind(t))
            .collect();
        if ignored.len() > MAX_IGNORE_TYPES {
            return Err(WarehouseError::TooManyIgnoreTypes {
                count: ignored.len(),
                max: MAX_IGNORE_TYPES,
            });
        }

        tracing::debug!(collector = %name, types = ?interest.types, "Collector registered");
        registered.push(Registered {
            collector,
            name,
            interest,
            failed: false,
        });
        Ok(registered.len() - 1)
    }

    /// Convenience for unboxed collectors
    pub fn register<C: Collector + 'static>(&mut self, collector: C) -> WarehouseResult<CollectorId> {
        self.register_collector(Box::new(collector))
    }

    /// Whether registration is closed
    pub fn is_frozen(&self) -> bool {
        matches!(self.registry, Registry::Closed)
    }

    /// Walk every token once, then finalize every collector.
    ///
    /// Registration closes before the first token is processed. Collectors
    /// are consumed: a second call returns `AlreadyDispatched`.
    pub fn dispatch_all(&mut self) -> WarehouseResult<Extraction> {
        let mut registered = match std::mem::replace(&mut self.registry, Registry::Closed) {
            Registry::Open(registered) => registered,
            Registry::Closed => return Err(WarehouseError::AlreadyDispatched),
        };

        let interests: Vec<Interest> = registered.iter().map(|r| r.interest.clone()).collect();
        let routing = RoutingTable::build(&interests)?;
        let policy = self.config.fault_policy;
        let index = &self.index;

        let mut extraction = Extraction::default();
        let mut open_mask = OpenMask::new();
        let mut open_stack: Vec<usize> = Vec::new();

        for (i, token) in index.tokens().iter().enumerate() {
            let bit = routing.bit_of(token.kind());
            let active = open_mask.current() | bit;

            let routes = routing.routes_for(token.kind());
            if !routes.is_empty() {
                let ctx = DispatchContext::new(&open_stack, index);
                for &id in routes {
                    let entry = &mut registered[id];
                    if entry.failed {
                        continue;
                    }
                    if routing.should_ignore(id, active) {
                        tracing::trace!(collector = %entry.name, index = i, "Inside ignored block");
                        extraction.stats.skipped_ignored += 1;
                        continue;
                    }
                    if !entry.collector.should_process(i, token, &ctx) {
                        extraction.stats.skipped_predicate += 1;
                        continue;
                    }

                    let collector = &mut entry.collector;
                    let result = guarded(policy, || collector.on_token(i, token, &ctx, index));
                    extraction.stats.delivered += 1;
                    if let Err(err) = result {
                        fail(policy, entry, FailureStage::Dispatch, err, &mut extraction.failures)?;
                    }
                }
            }

            advance(index, i, token, bit, &mut open_stack, &mut open_mask);
        }
        extraction.stats.tokens = index.len();

        let guard = TimeoutGuard::new(&self.config.timeout);
        for entry in registered.iter_mut() {
            if entry.failed {
                continue;
            }
            let collector = &mut entry.collector;
            let result = guard.run(&entry.name, |deadline| {
                guarded(policy, || collector.finalize(index, deadline))
            });
            match result {
                Ok(output) => {
                    if output.truncated {
                        tracing::debug!(
                            collector = %entry.name,
                            max_allowed = output.max_allowed,
                            "Collector output truncated at cap"
                        );
                    }
                    extraction.results.insert(entry.name.clone(), output);
                }
                Err(err) => {
                    fail(policy, entry, FailureStage::Finalize, err, &mut extraction.failures)?;
                }
            }
        }

        tracing::debug!(
            tokens = extraction.stats.tokens,
            delivered = extraction.stats.delivered,
            skipped_ignored = extraction.stats.skipped_ignored,
            results = extraction.results.len(),
            failures = extraction.failures.len(),
            "Dispatch complete"
        );

        Ok(extraction)
    }

    /// Query surface over the built indices
    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn iter_by_type<'a>(&'a self, kind: &str) -> impl Iterator<Item = (usize, &'a Token)> + 'a {
        self.index.iter_by_type(kind)
    }

    pub fn line_range(&self, index: usize) -> Option<LineRange> {
        self.index.line_range(index)
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.index.parent(index)
    }

    pub fn section_of(&self, line: usize) -> Option<&Section> {
        self.index.section_of(line)
    }

    pub fn sections(&self) -> &[Section] {
        self.index.sections()
    }

    pub fn fences(&self) -> &[Fence] {
        self.index.fences()
    }
}

/// Track open paired blocks after a token was delivered
fn advance(
    index: &DocumentIndex,
    i: usize,
    token: &Token,
    bit: u64,
    open_stack: &mut Vec<usize>,
    open_mask: &mut OpenMask,
) {
    let Some(partner) = index.pair_of(i) else {
        return;
    };
    if token.is_open() {
        open_stack.push(i);
        open_mask.enter(bit);
    } else if token.is_close() {
        if open_stack.last() == Some(&partner) {
            open_stack.pop();
        }
        open_mask.leave(bit);
    }
}

/// Run collector code; under the lenient policy a panic becomes an error
fn guarded<T>(
    policy: FaultPolicy,
    f: impl FnOnce() -> Result<T, CollectorError>,
) -> Result<T, CollectorError> {
    match policy {
        FaultPolicy::Strict => f(),
        FaultPolicy::Lenient => match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result,
            Err(payload) => Err(CollectorError::Panicked(panic_message(payload.as_ref()))),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Apply the fault policy to a collector error
fn fail(
    policy: FaultPolicy,
    entry: &mut Registered,
    stage: FailureStage,
    err: CollectorError,
    failures: &mut Vec<CollectorFailure>,
) -> WarehouseResult<()> {
    match policy {
        FaultPolicy::Strict => Err(WarehouseError::Collector {
            name: entry.name.clone(),
            source: err,
        }),
        FaultPolicy::Lenient => {
            tracing::warn!(collector = %entry.name, ?stage, error = %err, "Collector failed; dropping it");
            entry.failed = true;
            let (timed_out, message) = match &err {
                CollectorError::Timeout { budget, .. } => {
                    (true, format!("finalize exceeded its {budget:?} budget"))
                }
                other => (false, other.to_string()),
            };
            failures.push(CollectorFailure {
                collector: entry.name.clone(),
                stage,
                timed_out,
                message,
            });
            Ok(())
        }
    }
}
