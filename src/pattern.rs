//! Repeated-sequence detection inside a family (loops, recursion)
//!
//! Works on the ordered locations of a family's spans, greedily from left to
//! right. At each index the longest repeating unit wins, so a loop whose body
//! itself repeats is reported once at the coarse level:
//!
//! ```text
//! locations: A B A B A B C D C D
//!            └─ (A B) x3 ─┘ └(C D) x2┘
//! patterns:  {start: 0, len: 2, repeats: 3}, {start: 6, len: 2, repeats: 2}
//! ```
//!
//! Patterns never overlap and positions they don't cover are ordinary single
//! spans.

use crate::span::Span;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

/// A maximal run of consecutive repetitions of one location subsequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanPattern {
    /// Position inside the family's `spans_indices`
    pub start_span_index: usize,

    /// Length of one repetition unit
    pub pattern_length: usize,

    /// Number of consecutive repetitions (at least 2)
    pub repeats: usize,

    /// Locations of one repetition unit
    pub sequence: Vec<String>,
}

impl SpanPattern {
    /// Number of spans covered by this pattern
    pub fn covered(&self) -> usize {
        self.pattern_length * self.repeats
    }

    /// Position just past the last covered span
    pub fn end_span_index(&self) -> usize {
        self.start_span_index + self.covered()
    }
}

/// Location string → dense id, scoped to one computation run
#[derive(Debug, Default)]
pub struct LocationInterner {
    ids: FnvHashMap<String, u32>,
    names: Vec<String>,
}

impl LocationInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `location`, allocating one on first sight
    pub fn intern(&mut self, location: &str) -> u32 {
        if let Some(&id) = self.ids.get(location) {
            return id;
        }
        let id = self.names.len() as u32;
        self.ids.insert(location.to_string(), id);
        self.names.push(location.to_string());
        id
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A detected run as `(start, pattern_length, repeats)`
pub type RawPattern = (usize, usize, usize);

/// Find non-overlapping repeated subsequences in `ids`
///
/// # Example
/// ```
/// use tracelines::pattern::find_repeats;
///
/// let ids = [1, 2, 1, 2, 1, 2, 1, 2];
/// assert_eq!(find_repeats(&ids, 100), vec![(0, 2, 4)]);
/// ```
pub fn find_repeats<T: PartialEq>(ids: &[T], max_pattern_length: usize) -> Vec<RawPattern> {
    let n = ids.len();
    let mut found = Vec::new();
    let mut i = 0;

    while i < n {
        let max_len = max_pattern_length.min((n - i) / 2);
        let mut matched = None;

        for len in (1..=max_len).rev() {
            let unit = &ids[i..i + len];
            let mut repeats = 1;
            while i + (repeats + 1) * len <= n
                && &ids[i + repeats * len..i + (repeats + 1) * len] == unit
            {
                repeats += 1;
            }

            if repeats >= 2 {
                matched = Some((len, repeats));
                break;
            }
        }

        match matched {
            Some((len, repeats)) => {
                found.push((i, len, repeats));
                i += len * repeats;
            }
            None => i += 1,
        }
    }

    found
}

/// Detect patterns among the members of one family
///
/// `spans_indices` is the family's start-ordered member list.
pub fn detect_family_patterns(
    spans: &[Span],
    spans_indices: &[usize],
    interner: &mut LocationInterner,
    max_pattern_length: usize,
) -> Vec<SpanPattern> {
    if spans_indices.len() < 2 {
        return Vec::new();
    }

    let ids: Vec<u32> = spans_indices
        .iter()
        .map(|&i| interner.intern(&spans[i].location))
        .collect();

    find_repeats(&ids, max_pattern_length)
        .into_iter()
        .map(|(start, len, repeats)| SpanPattern {
            start_span_index: start,
            pattern_length: len,
            repeats,
            sequence: spans_indices[start..start + len]
                .iter()
                .map(|&i| spans[i].location.clone())
                .collect(),
        })
        .collect()
}
