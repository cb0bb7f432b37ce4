//! Event grouping: `filepath -> parent_id -> trace_id -> [events]`
//!
//! Isolates every phase of one logical unit, scoped by file and by invoker, so
//! span building never mixes unrelated units whose ids collide. Buckets are
//! ordered maps: iteration order depends only on the keys, never on the order
//! the events arrived in.

use crate::event::RawEvent;
use std::collections::BTreeMap;

/// Events of one logical unit, keyed by trace id
pub type TraceBuckets<'a> = BTreeMap<&'a str, Vec<&'a RawEvent>>;

/// Trace buckets keyed by parent id
pub type ParentBuckets<'a> = BTreeMap<&'a str, TraceBuckets<'a>>;

/// Borrowed three-level grouping of a batch of events
#[derive(Debug, Default)]
pub struct EventGroups<'a> {
    files: BTreeMap<&'a str, ParentBuckets<'a>>,
    event_count: usize,
}

impl<'a> EventGroups<'a> {
    /// Number of distinct source files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Number of events grouped
    pub fn event_count(&self) -> usize {
        self.event_count
    }

    /// Number of `(file, parent, trace)` buckets
    pub fn bucket_count(&self) -> usize {
        self.files
            .values()
            .flat_map(|parents| parents.values())
            .map(|traces| traces.len())
            .sum()
    }

    /// Visit every bucket as `(filepath, parent_id, trace_id, events)`
    pub fn buckets(&self) -> impl Iterator<Item = (&'a str, &'a str, &'a str, &[&'a RawEvent])> + '_ {
        self.files.iter().flat_map(|(&file, parents)| {
            parents.iter().flat_map(move |(&parent, traces)| {
                traces
                    .iter()
                    .map(move |(&trace, events)| (file, parent, trace, events.as_slice()))
            })
        })
    }

    /// Buckets of one file
    pub fn file(&self, filepath: &str) -> Option<&ParentBuckets<'a>> {
        self.files.get(filepath)
    }
}

/// Group events by start filepath, then parent id, then trace id
///
/// Pure grouping: nothing is filtered and events keep their input order inside
/// a bucket.
///
/// # Example
/// ```
/// use tracelines::event::{Position, RawEvent, TraceType};
/// use tracelines::grouper::group_events;
///
/// let pos = Position::new("a.js", 1, 0);
/// let events = vec![
///     RawEvent::new("t1", "orphan-1", TraceType::Enter, 0, pos.clone(), pos.clone()),
///     RawEvent::new("t1", "orphan-1", TraceType::Exit, 5, pos.clone(), pos.clone()),
/// ];
/// let groups = group_events(&events);
/// assert_eq!(groups.bucket_count(), 1);
/// ```
pub fn group_events(events: &[RawEvent]) -> EventGroups<'_> {
    let mut files: BTreeMap<&str, ParentBuckets<'_>> = BTreeMap::new();

    for event in events {
        files
            .entry(event.start_pos.filepath.as_str())
            .or_default()
            .entry(event.parent_id.as_str())
            .or_default()
            .entry(event.trace_id.as_str())
            .or_default()
            .push(event);
    }

    EventGroups {
        files,
        event_count: events.len(),
    }
}
