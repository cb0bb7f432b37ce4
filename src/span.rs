//! Span building: one record per logical execution unit
//!
//! A span collapses every phase (Enter, Exit, Error) of one `trace_id` into a
//! single interval. Missing phases are filled from the ones that were seen:
//!
//! ```text
//! start = Enter ?? Error ?? Exit
//! end   = Exit  ?? Error ?? Enter
//! ```
//!
//! A trace with only an Error event therefore becomes a zero-width span. A
//! trace with none of the three phases (only Normal/Awaited, or an interrupted
//! capture) produces no span at all.

use crate::event::{Position, RawEvent, TraceType};
use crate::grouper::EventGroups;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Reconstructed record of one logical execution unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Source `trace_id`, unique across spans
    pub trace_id: String,

    /// Invoking trace (or orphan id), key of the owning family
    pub parent_id: String,

    /// `filepath:startLine` of the representative event
    pub location: String,

    /// Start position of the representative event
    pub position: Position,

    pub end_line: u32,
    pub end_column: u32,

    pub is_error: bool,

    /// An Enter event was observed
    pub is_start_definite: bool,

    /// An Exit event was observed
    pub is_end_definite: bool,

    pub start_timestamp: u64,
    pub end_timestamp: u64,

    /// Owning family, filled in by the family builder
    pub family_index: Option<usize>,

    /// Families this span invoked directly
    pub children_family_indices: Vec<usize>,

    /// Families temporally nested in this span without a direct call
    pub indirect_children_family_indices: Vec<usize>,
}

impl Span {
    /// Duration in nanoseconds (zero for error-only spans)
    pub fn duration_nanos(&self) -> u64 {
        self.end_timestamp.saturating_sub(self.start_timestamp)
    }
}

/// Collapse the phases of one trace into a span
///
/// `events` may be in any order. Returns `None` when no Enter, Exit or Error
/// phase is present.
pub fn build_span(events: &[&RawEvent]) -> Option<Span> {
    let mut sorted: Vec<&RawEvent> = events.to_vec();
    sorted.sort_by_key(|ev| (ev.timestamp, ev.trace_type.tie_rank()));

    let enter = sorted
        .iter()
        .find(|ev| ev.trace_type == TraceType::Enter)
        .copied();
    let exit = sorted
        .iter()
        .rev()
        .find(|ev| ev.trace_type == TraceType::Exit)
        .copied();
    let error = sorted
        .iter()
        .rev()
        .find(|ev| ev.trace_type == TraceType::Error)
        .copied();

    let start = enter.or(error).or(exit)?;
    let end = exit.or(error).or(enter)?;

    Some(Span {
        trace_id: start.trace_id.clone(),
        parent_id: start.parent_id.clone(),
        location: format!("{}:{}", start.start_pos.filepath, start.start_pos.line),
        position: start.start_pos.clone(),
        end_line: start.end_pos.line,
        end_column: start.end_pos.column,
        is_error: error.is_some(),
        is_start_definite: enter.is_some(),
        is_end_definite: exit.is_some(),
        start_timestamp: start.timestamp,
        end_timestamp: end.timestamp,
        family_index: None,
        children_family_indices: Vec::new(),
        indirect_children_family_indices: Vec::new(),
    })
}

/// Build every span of a grouped batch
///
/// Each trace id is built once: a trace id met again under another file or
/// parent bucket is ignored.
pub fn build_spans(groups: &EventGroups<'_>) -> Vec<Span> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut spans = Vec::with_capacity(groups.bucket_count());
    let mut skipped = 0usize;
    let mut duplicates = 0usize;

    for (_file, _parent, trace_id, events) in groups.buckets() {
        if !seen.insert(trace_id) {
            duplicates += 1;
            continue;
        }

        match build_span(events) {
            Some(span) => spans.push(span),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "Skipped traces without Enter/Exit/Error phase");
    }
    if duplicates > 0 {
        tracing::debug!(duplicates, "Ignored trace ids repeated under another file or parent");
    }

    spans
}
