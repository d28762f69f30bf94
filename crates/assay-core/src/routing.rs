//! Routing table
//!
//! Maps a token type to the collectors interested in it, in registration
//! order. Ignore-subtree sets are packed into bitmasks: every distinct ignored
//! type gets one bit, assigned by sorting the type names, so a collector's
//! "am I inside something I ignore" check is a single AND against the mask of
//! currently open types. The bit layout stays internal; callers only see
//! [`RoutingTable::should_ignore`] and `DispatchContext::is_inside`.

use std::collections::{BTreeSet, HashMap};

use crate::error::{WarehouseError, WarehouseResult};
use crate::token::base_kind;

/// Position of a collector in registration order
pub type CollectorId = usize;

/// Width of the ignore mask
pub const MAX_IGNORE_TYPES: usize = 64;

/// Token types a collector wants, and block types whose contents it skips
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interest {
    pub types: Vec<String>,
    pub ignore_inside: Vec<String>,
}

impl Interest {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
            ignore_inside: Vec::new(),
        }
    }

    /// Skip every token inside blocks of these types (`blockquote_open` and
    /// `blockquote` are equivalent). A self-contained type skips just itself.
    pub fn ignoring<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_inside.extend(types.into_iter().map(Into::into));
        self
    }
}

/// Frozen routing built when dispatch begins
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<String, Vec<CollectorId>>,
    bits: HashMap<String, u64>,
    masks: Vec<u64>,
}

impl RoutingTable {
    /// Build from interests listed in registration order
    pub fn build(interests: &[Interest]) -> WarehouseResult<Self> {
        let ignored: BTreeSet<&str> = interests
            .iter()
            .flat_map(|i| i.ignore_inside.iter())
            .map(|t| base_kind(t))
            .collect();
        if ignored.len() > MAX_IGNORE_TYPES {
            return Err(WarehouseError::TooManyIgnoreTypes {
                count: ignored.len(),
                max: MAX_IGNORE_TYPES,
            });
        }
        let bits: HashMap<String, u64> = ignored
            .iter()
            .enumerate()
            .map(|(bit, kind)| (kind.to_string(), 1u64 << bit))
            .collect();

        let mut routes: HashMap<String, Vec<CollectorId>> = HashMap::new();
        let mut masks = Vec::with_capacity(interests.len());
        for (id, interest) in interests.iter().enumerate() {
            let mut seen = BTreeSet::new();
            for kind in &interest.types {
                if seen.insert(kind.as_str()) {
                    routes.entry(kind.clone()).or_default().push(id);
                }
            }
            let mask = interest
                .ignore_inside
                .iter()
                .map(|t| bits[base_kind(t)])
                .fold(0u64, |acc, bit| acc | bit);
            masks.push(mask);
        }

        Ok(Self { routes, bits, masks })
    }

    /// Collectors routed to a token type, in registration order
    pub fn routes_for(&self, kind: &str) -> &[CollectorId] {
        self.routes.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mask bit of a token type; zero when no collector ignores it
    pub(crate) fn bit_of(&self, kind: &str) -> u64 {
        self.bits.get(base_kind(kind)).copied().unwrap_or(0)
    }

    /// Whether the collector must skip tokens while `open_mask` is active
    pub fn should_ignore(&self, collector: CollectorId, open_mask: u64) -> bool {
        self.masks
            .get(collector)
            .is_some_and(|mask| mask & open_mask != 0)
    }

    pub fn has_ignore_rules(&self) -> bool {
        !self.bits.is_empty()
    }
}

/// Open-type mask maintained while walking the token stream
#[derive(Debug, Clone)]
pub(crate) struct OpenMask {
    counts: [u32; MAX_IGNORE_TYPES],
    mask: u64,
}

impl OpenMask {
    pub(crate) fn new() -> Self {
        Self {
            counts: [0; MAX_IGNORE_TYPES],
            mask: 0,
        }
    }

    pub(crate) fn current(&self) -> u64 {
        self.mask
    }

    pub(crate) fn enter(&mut self, bit: u64) {
        if bit == 0 {
            return;
        }
        let slot = bit.trailing_zeros() as usize;
        self.counts[slot] += 1;
        self.mask |= bit;
    }

    pub(crate) fn leave(&mut self, bit: u64) {
        if bit == 0 {
            return;
        }
        let slot = bit.trailing_zeros() as usize;
        self.counts[slot] = self.counts[slot].saturating_sub(1);
        if self.counts[slot] == 0 {
            self.mask &= !bit;
        }
    }
}
