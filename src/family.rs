//! Family building: spans grouped by their invoker
//!
//! A family holds every span sharing one `parent_id`. Members are ordered by
//! start timestamp (stable, so ties keep span order). The family's extent and
//! definiteness come from its temporal extremes only: first member's start,
//! last member's end.

use crate::event::is_orphan_id;
use crate::pattern::SpanPattern;
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sibling spans sharing one invoker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    /// Location of the invoking span when it is known, else the parent id
    pub label: String,

    pub parent_id: String,

    /// Parent id denotes "no known parent"
    pub is_root: bool,

    /// Member spans sorted by start timestamp
    pub spans_indices: Vec<usize>,

    pub start_timestamp: u64,
    pub end_timestamp: u64,
    pub is_start_definite: bool,
    pub is_end_definite: bool,

    /// Repeated location runs among the members
    pub patterns: Vec<SpanPattern>,
}

impl Family {
    pub fn len(&self) -> usize {
        self.spans_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans_indices.is_empty()
    }
}

/// Build one family per distinct parent id and back-fill `Span::family_index`
///
/// Families are created in order of first appearance in `spans`.
pub fn build_families(spans: &mut [Span], orphan_prefix: &str) -> Vec<Family> {
    let mut members: Vec<(String, Vec<usize>)> = Vec::new();
    let mut by_parent: HashMap<&str, usize> = HashMap::new();

    for (idx, span) in spans.iter().enumerate() {
        let slot = *by_parent.entry(span.parent_id.as_str()).or_insert_with(|| {
            members.push((span.parent_id.clone(), Vec::new()));
            members.len() - 1
        });
        members[slot].1.push(idx);
    }

    let location_by_trace: HashMap<&str, &str> = spans
        .iter()
        .map(|s| (s.trace_id.as_str(), s.location.as_str()))
        .collect();

    let mut families = Vec::with_capacity(members.len());
    for (parent_id, mut indices) in members {
        indices.sort_by_key(|&i| spans[i].start_timestamp);

        // Never empty: a slot is only created for a span that joins it
        let first = &spans[indices[0]];
        let last = &spans[indices[indices.len() - 1]];

        let label = location_by_trace
            .get(parent_id.as_str())
            .map(|loc| loc.to_string())
            .unwrap_or_else(|| parent_id.clone());

        families.push(Family {
            label,
            is_root: is_orphan_id(&parent_id, orphan_prefix),
            start_timestamp: first.start_timestamp,
            end_timestamp: last.end_timestamp,
            is_start_definite: first.is_start_definite,
            is_end_definite: last.is_end_definite,
            parent_id,
            spans_indices: indices,
            patterns: Vec::new(),
        });
    }

    for (family_idx, family) in families.iter().enumerate() {
        for &span_idx in &family.spans_indices {
            spans[span_idx].family_index = Some(family_idx);
        }
    }

    families
}
