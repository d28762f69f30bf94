//! Index Builder
//!
//! Builds a [`DocumentIndex`] from canonical tokens in one pass.
//!
//! The pass keeps a stack of open token indices. Each token's parent is read
//! from the top of the stack before the token itself pushes or pops, and a
//! paired closer is then re-parented to its opener. Children are rebuilt from
//! the parent links afterwards.
//!
//! The token stream is untrusted: dangling closers, openers that are never
//! closed and headings with nonsensical line maps are tolerated and counted,
//! never fatal.

use std::collections::HashMap;

use super::sections::{Section, SectionIndex};
use super::{DocumentIndex, Fence, IndexStats, Pair};
use crate::token::Token;

/// Single-pass builder
pub struct IndexBuilder<'s> {
    tokens: Vec<Token>,
    source: &'s str,
}

/// Open heading while sections are being built
struct OpenHeading {
    level: u8,
    section: usize,
}

impl<'s> IndexBuilder<'s> {
    pub fn new(tokens: Vec<Token>, source: &'s str) -> Self {
        Self { tokens, source }
    }

    pub fn build(self) -> DocumentIndex {
        let n = self.tokens.len();
        let tokens = self.tokens;

        let mut parents: Vec<Option<usize>> = Vec::with_capacity(n);
        let mut pair_of: Vec<Option<usize>> = vec![None; n];
        let mut pairs: Vec<Pair> = Vec::new();
        let mut by_type: HashMap<String, Vec<usize>> = HashMap::new();
        let mut fences: Vec<Fence> = Vec::new();
        let mut stats = IndexStats {
            tokens: n,
            ..IndexStats::default()
        };

        let mut stack: Vec<usize> = Vec::with_capacity(32);
        // How many entries of each base type are on the stack, so a closer
        // can tell in O(1) whether a matching opener exists at all.
        let mut open_counts: HashMap<&str, usize> = HashMap::new();

        let mut sections: Vec<Section> = Vec::new();
        let mut heading_stack: Vec<OpenHeading> = Vec::new();
        // (heading token index, section id) awaiting its title
        let mut pending_title: Option<(usize, usize)> = None;

        let mut max_map_end = 0usize;

        for (i, token) in tokens.iter().enumerate() {
            // Parent first, before this token touches the stack.
            parents.push(stack.last().copied());

            by_type.entry(token.kind().to_string()).or_default().push(i);
            if let Some(map) = token.map() {
                max_map_end = max_map_end.max(map.end);
            }

            match token.nesting() {
                1 => {
                    stack.push(i);
                    *open_counts.entry(token.base_kind()).or_insert(0) += 1;
                    stats.max_depth = stats.max_depth.max(stack.len());
                }
                -1 => {
                    let base = token.base_kind();
                    if open_counts.get(base).copied().unwrap_or(0) == 0 {
                        tracing::debug!(index = i, kind = token.kind(), "Dangling closer");
                        stats.malformed += 1;
                    } else {
                        while let Some(open) = stack.pop() {
                            let open_base = tokens[open].base_kind();
                            if let Some(count) = open_counts.get_mut(open_base) {
                                *count -= 1;
                            }
                            if open_base == base {
                                pairs.push(Pair { open, close: i });
                                pair_of[open] = Some(i);
                                pair_of[i] = Some(open);
                                parents[i] = Some(open);
                                break;
                            }
                            tracing::debug!(
                                index = open,
                                kind = tokens[open].kind(),
                                "Opener implicitly closed"
                            );
                            stats.malformed += 1;
                        }
                    }
                }
                _ => {}
            }

            match token.kind() {
                "heading_open" => {
                    pending_title = None;
                    let Some(map) = token.map() else {
                        tracing::debug!(index = i, "Heading without line map skipped");
                        stats.malformed += 1;
                        continue;
                    };
                    if let Some(prev) = sections.last_mut() {
                        if map.start <= prev.start_line {
                            tracing::debug!(index = i, line = map.start, "Out-of-order heading skipped");
                            stats.malformed += 1;
                            continue;
                        }
                        prev.end_line = map.start - 1;
                    }

                    let level = token.heading_level();
                    while heading_stack.last().is_some_and(|h| h.level >= level) {
                        heading_stack.pop();
                    }
                    let id = sections.len();
                    sections.push(Section {
                        id,
                        start_line: map.start,
                        end_line: map.start,
                        level,
                        title: String::new(),
                        heading_index: i,
                        parent: heading_stack.last().map(|h| h.section),
                    });
                    heading_stack.push(OpenHeading { level, section: id });
                    pending_title = Some((i, id));
                }
                "heading_close" => {
                    pending_title = None;
                }
                "inline" => {
                    // Only a content token directly under the heading names it.
                    if let Some((heading, section)) = pending_title {
                        if parents[i] == Some(heading) {
                            sections[section].title = token.content().trim().to_string();
                            pending_title = None;
                        }
                    }
                }
                "fence" => {
                    if let Some(map) = token.map() {
                        fences.push(Fence {
                            token_index: i,
                            start: map.start,
                            end: map.end,
                            language: fence_language(token.info()),
                            info: token.info().to_string(),
                        });
                    }
                }
                _ => {}
            }
        }

        drop(open_counts);

        if !stack.is_empty() {
            tracing::debug!(unclosed = stack.len(), "Openers left unclosed at end of stream");
            stats.malformed += stack.len();
        }

        let total_lines = line_count(self.source).max(max_map_end);
        if let Some(last) = sections.last_mut() {
            last.end_line = total_lines.saturating_sub(1).max(last.start_line);
        }

        let (children_ranges, children_data) = build_children_from_parents(&parents);

        stats.pairs = pairs.len();
        stats.sections = sections.len();
        stats.fences = fences.len();

        tracing::debug!(
            tokens = stats.tokens,
            pairs = stats.pairs,
            sections = stats.sections,
            fences = stats.fences,
            malformed = stats.malformed,
            "Index built"
        );

        DocumentIndex {
            tokens,
            parents,
            pairs,
            pair_of,
            children_ranges,
            children_data,
            by_type,
            sections: SectionIndex::new(sections),
            fences,
            total_lines,
            stats,
        }
    }
}

fn fence_language(info: &str) -> String {
    info.split_whitespace()
        .next()
        .map(|word| word.trim_start_matches('{').trim_start_matches('.'))
        .unwrap_or("")
        .to_string()
}

fn line_count(source: &str) -> usize {
    source.lines().count()
}

/// Flat children storage: per-token `(start, count)` into one shared vector
fn build_children_from_parents(parents: &[Option<usize>]) -> (Vec<(u32, u32)>, Vec<usize>) {
    let n = parents.len();
    let mut counts = vec![0u32; n];
    for parent in parents.iter().flatten() {
        counts[*parent] += 1;
    }

    let mut ranges = Vec::with_capacity(n);
    let mut offset = 0u32;
    for &count in &counts {
        ranges.push((offset, count));
        offset += count;
    }

    let mut data = vec![0usize; offset as usize];
    let mut fill = vec![0u32; n];
    for (child, parent) in parents.iter().enumerate() {
        if let Some(p) = *parent {
            let slot = ranges[p].0 + fill[p];
            data[slot as usize] = child;
            fill[p] += 1;
        }
    }

    (ranges, data)
}
