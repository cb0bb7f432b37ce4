//! Containment linking between spans and families
//!
//! Two kinds of edges are attached to every span:
//!
//! - **Direct**: families whose `parent_id` is the span's `trace_id` (the span
//!   invoked them).
//! - **Indirect**: non-root families strictly inside the span's time interval
//!   with no direct relation (callbacks, event handlers, deferred work).
//!
//! # Indirect linking
//!
//! Comparing every span with every family is O(spans × families). Instead the
//! families are sorted by start once, and for each span:
//!
//! ```text
//! first = partition_point(start <= span.start)      // O(log F)
//! for f in sorted[first..] while f.start < span.end // only candidates
//!     keep f if f.end < span.end && !f.is_root && f not direct
//! ```
//!
//! The scan stops at the first family starting at or after the span's end:
//! no later family in start order can be inside the span.

use crate::config::TimelineConfig;
use crate::family::Family;
use crate::span::Span;
use std::collections::HashMap;

/// Counts of edges created by one linking pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub direct: usize,
    pub indirect: usize,
}

/// Attach every family to the span that invoked it
pub fn link_direct(spans: &mut [Span], families: &[Family]) -> usize {
    let mut by_parent: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, family) in families.iter().enumerate() {
        by_parent
            .entry(family.parent_id.as_str())
            .or_default()
            .push(idx);
    }

    let mut linked = 0;
    for span in spans.iter_mut() {
        if let Some(children) = by_parent.get(span.trace_id.as_str()) {
            span.children_family_indices = children.clone();
            linked += children.len();
        } else {
            span.children_family_indices.clear();
        }
    }

    linked
}

/// Family indices ordered by start timestamp, ties by index
pub fn families_by_start(families: &[Family]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..families.len()).collect();
    order.sort_by_key(|&i| families[i].start_timestamp);
    order
}

/// Families strictly inside `span` that it did not invoke
///
/// Root families are skipped unless `include_roots` is set. `order` must come
/// from [`families_by_start`].
pub fn indirect_children(
    span: &Span,
    families: &[Family],
    order: &[usize],
    include_roots: bool,
) -> Vec<usize> {
    let first = order.partition_point(|&i| families[i].start_timestamp <= span.start_timestamp);

    let mut found = Vec::new();
    for &idx in &order[first..] {
        let family = &families[idx];
        if family.start_timestamp >= span.end_timestamp {
            break;
        }

        if family.end_timestamp < span.end_timestamp
            && (include_roots || !family.is_root)
            && family.parent_id != span.trace_id
            && !span.children_family_indices.contains(&idx)
        {
            found.push(idx);
        }
    }

    found.sort_unstable();
    found
}

/// Attach temporally nested families to every span
///
/// Must run after [`link_direct`] so direct children are excluded.
pub fn link_indirect(spans: &mut [Span], families: &[Family], include_roots: bool) -> usize {
    let order = families_by_start(families);

    let mut linked = 0;
    for span in spans.iter_mut() {
        let found = indirect_children(span, families, &order, include_roots);
        linked += found.len();
        span.indirect_children_family_indices = found;
    }

    linked
}

/// Run direct linking, then indirect linking when enabled
pub fn link_containment(spans: &mut [Span], families: &[Family], config: &TimelineConfig) -> LinkStats {
    let direct = link_direct(spans, families);
    let indirect = if config.link_indirect {
        link_indirect(spans, families, config.indirect_roots)
    } else {
        for span in spans.iter_mut() {
            span.indirect_children_family_indices.clear();
        }
        0
    };

    tracing::debug!(direct, indirect, "Linked containment");
    LinkStats { direct, indirect }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Position, DEFAULT_ORPHAN_PREFIX};
    use crate::family::build_families;

    fn span(trace: &str, parent: &str, start: u64, end: u64) -> Span {
        Span {
            trace_id: trace.to_string(),
            parent_id: parent.to_string(),
            location: format!("cb.js:{}", start),
            position: Position::new("cb.js", 1, 0),
            end_line: 1,
            end_column: 0,
            is_error: false,
            is_start_definite: true,
            is_end_definite: true,
            start_timestamp: start,
            end_timestamp: end,
            family_index: None,
            children_family_indices: Vec::new(),
            indirect_children_family_indices: Vec::new(),
        }
    }

    fn linked(mut spans: Vec<Span>) -> (Vec<Span>, Vec<Family>, LinkStats) {
        let families = build_families(&mut spans, DEFAULT_ORPHAN_PREFIX);
        let stats = link_containment(&mut spans, &families, &TimelineConfig::default());
        (spans, families, stats)
    }

    fn family_of(families: &[Family], parent: &str) -> usize {
        families.iter().position(|f| f.parent_id == parent).unwrap()
    }

    #[test]
    fn test_direct_child_family() {
        let (spans, families, stats) = linked(vec![
            span("a", "orphan-1", 0, 100),
            span("b", "a", 10, 20),
        ]);

        let fam_a = family_of(&families, "a");
        assert_eq!(spans[0].children_family_indices, vec![fam_a]);
        assert!(spans[0].indirect_children_family_indices.is_empty());
        assert!(spans[1].children_family_indices.is_empty());
        assert_eq!(stats, LinkStats { direct: 1, indirect: 0 });
    }

    #[test]
    fn test_root_families_never_indirect() {
        // Callback under an orphan parent is a root and stays unlinked
        let (spans, _families, stats) = linked(vec![
            span("a", "orphan-1", 0, 100),
            span("b", "orphan-2", 10, 20),
        ]);

        assert!(spans[0].indirect_children_family_indices.is_empty());
        assert_eq!(stats.indirect, 0);
    }

    #[test]
    fn test_root_families_linked_when_enabled() {
        let mut spans = vec![span("a", "orphan-1", 0, 100), span("b", "orphan-2", 10, 20)];
        let families = build_families(&mut spans, DEFAULT_ORPHAN_PREFIX);
        let config = TimelineConfig {
            indirect_roots: true,
            ..TimelineConfig::default()
        };
        let stats = link_containment(&mut spans, &families, &config);

        let fam_orphan2 = family_of(&families, "orphan-2");
        assert_eq!(spans[0].indirect_children_family_indices, vec![fam_orphan2]);
        assert_eq!(stats.indirect, 1);
    }

    #[test]
    fn test_indirect_nested_family() {
        // "cb" was invoked by "timer", which lives outside "a", but runs inside "a"
        let (spans, families, _) = linked(vec![
            span("a", "orphan-1", 0, 100),
            span("timer", "orphan-2", 200, 300),
            span("cb", "timer", 10, 20),
        ]);

        let fam_timer = family_of(&families, "timer");
        assert_eq!(spans[0].indirect_children_family_indices, vec![fam_timer]);
        assert!(spans[1].indirect_children_family_indices.is_empty());
        assert_eq!(spans[1].children_family_indices, vec![fam_timer]);
    }

    #[test]
    fn test_strict_containment_boundaries() {
        let (spans, _, _) = linked(vec![
            span("a", "orphan-1", 10, 100),
            span("x", "orphan-9", 500, 600),
            span("same-start", "x", 10, 50),
            span("y", "orphan-8", 700, 800),
            span("same-end", "y", 20, 100),
        ]);

        assert!(spans[0].indirect_children_family_indices.is_empty());
    }

    #[test]
    fn test_direct_child_not_duplicated_as_indirect() {
        let (spans, _, _) = linked(vec![span("a", "orphan-1", 0, 100), span("b", "a", 10, 20)]);

        for s in &spans {
            for f in &s.indirect_children_family_indices {
                assert!(!s.children_family_indices.contains(f));
            }
        }
    }

    #[test]
    fn test_scan_stops_at_span_end() {
        let families_spans = vec![
            span("host", "orphan-1", 0, 50),
            span("p1", "orphan-2", 1000, 2000),
            span("c1", "p1", 10, 20),
            span("p2", "orphan-3", 3000, 4000),
            span("c2", "p2", 60, 70),
        ];
        let (spans, families, _) = linked(families_spans);

        let fam_p1 = family_of(&families, "p1");
        assert_eq!(spans[0].indirect_children_family_indices, vec![fam_p1]);
    }

    #[test]
    fn test_indirect_disabled() {
        let mut spans = vec![
            span("a", "orphan-1", 0, 100),
            span("timer", "orphan-2", 200, 300),
            span("cb", "timer", 10, 20),
        ];
        let families = build_families(&mut spans, DEFAULT_ORPHAN_PREFIX);
        let stats = link_containment(&mut spans, &families, &TimelineConfig::structure_only());

        assert_eq!(stats.indirect, 0);
        assert!(spans[0].indirect_children_family_indices.is_empty());
    }
}
