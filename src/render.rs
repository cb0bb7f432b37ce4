//! Plain-text rendering of a Timeline
//!
//! ```text
//! 3 spans, 2 families, 1 cluster, 0 errors
//! time range: 0ns .. 100ns (100ns)
//!
//! == cluster "default" ==
//! #1 score 2  orphan-1 (1 span)
//!   main.js:1  0ns .. 100ns (100ns)
//!     ├─ main.js:1 (2 spans)
//!       main.js:2  10ns .. 20ns (10ns)
//!       main.js:3  30ns .. 40ns (10ns)
//! ```
//!
//! Repeated runs detected inside a family are collapsed into one line.
//! Indirect children are marked with `~`.

use crate::span::Span;
use crate::timeline::Timeline;
use std::collections::HashSet;
use std::fmt::{self, Write};

/// Default depth of the containment tree below each root family
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Knobs for [`render_text`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Family nesting levels shown below a root
    pub max_depth: usize,
    /// Render child families under each span
    pub show_children: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            show_children: true,
        }
    }
}

enum Item {
    Family {
        index: usize,
        depth: usize,
        indirect: bool,
    },
    Span {
        index: usize,
        depth: usize,
    },
    Pattern {
        family: usize,
        pattern: usize,
        depth: usize,
    },
}

/// Human-readable duration from nanoseconds
pub fn format_nanos(nanos: u64) -> String {
    match nanos {
        n if n < 1_000 => format!("{}ns", n),
        n if n < 1_000_000 => format!("{:.2}μs", n as f64 / 1_000.0),
        n if n < 1_000_000_000 => format!("{:.2}ms", n as f64 / 1_000_000.0),
        n => format!("{:.3}s", n as f64 / 1_000_000_000.0),
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{} {}", count, if count == 1 { one } else { many })
}

/// One-line summary of a Timeline
pub fn summary_line(timeline: &Timeline) -> String {
    format!(
        "{}, {}, {}, {}",
        plural(timeline.spans.len(), "span", "spans"),
        plural(timeline.families.len(), "family", "families"),
        plural(timeline.clusters.len(), "cluster", "clusters"),
        plural(timeline.error_count(), "error", "errors")
    )
}

fn span_line(span: &Span) -> String {
    let start = if span.is_start_definite { "" } else { "?" };
    let end = if span.is_end_definite { "" } else { "?" };
    let error = if span.is_error { "  [error]" } else { "" };
    format!(
        "{}  {}{} .. {}{} ({}){}",
        span.location,
        start,
        format_nanos(span.start_timestamp),
        format_nanos(span.end_timestamp),
        end,
        format_nanos(span.duration_nanos()),
        error
    )
}

/// Render a Timeline as an indented containment tree, root families first
pub fn render_text(timeline: &Timeline, options: &RenderOptions) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_text(&mut out, timeline, options)?;
    Ok(out)
}

/// Write the containment tree of a Timeline to any formatter sink
pub fn write_text<W: Write>(out: &mut W, timeline: &Timeline, options: &RenderOptions) -> fmt::Result {
    writeln!(out, "{}", summary_line(timeline))?;
    if let (Some(first), Some(last)) = (
        timeline.unique_timestamps.first(),
        timeline.unique_timestamps.last(),
    ) {
        writeln!(
            out,
            "time range: {} .. {} ({})",
            format_nanos(*first),
            format_nanos(*last),
            format_nanos(last - first)
        )?;
    }

    for cluster in &timeline.clusters {
        writeln!(out, "\n== cluster \"{}\" ==", cluster.name)?;
        for (rank, scored) in cluster.root_families.iter().enumerate() {
            let family = &timeline.families[scored.family_index];
            writeln!(
                out,
                "#{} score {}  {} ({})",
                rank + 1,
                scored.score,
                family.label,
                plural(family.len(), "span", "spans")
            )?;
            render_tree(out, timeline, scored.family_index, options)?;
        }
    }

    Ok(())
}

fn push_family_members(stack: &mut Vec<Item>, timeline: &Timeline, family_index: usize, depth: usize) {
    let family = &timeline.families[family_index];
    let mut items = Vec::new();
    let mut position = 0;
    let mut patterns = family.patterns.iter().enumerate().peekable();

    while position < family.spans_indices.len() {
        match patterns.peek() {
            Some((pattern_index, pattern)) if pattern.start_span_index == position => {
                items.push(Item::Pattern {
                    family: family_index,
                    pattern: *pattern_index,
                    depth,
                });
                position = pattern.end_span_index();
                patterns.next();
            }
            _ => {
                items.push(Item::Span {
                    index: family.spans_indices[position],
                    depth,
                });
                position += 1;
            }
        }
    }

    stack.extend(items.into_iter().rev());
}

/// Queue the not yet shown child families of `spans`, direct before indirect per span
fn push_children(
    stack: &mut Vec<Item>,
    visited: &mut HashSet<usize>,
    timeline: &Timeline,
    spans: &[usize],
    depth: usize,
) {
    let mut items = Vec::new();
    for &span_index in spans {
        let span = &timeline.spans[span_index];
        let children = span
            .children_family_indices
            .iter()
            .map(|&f| (f, false))
            .chain(span.indirect_children_family_indices.iter().map(|&f| (f, true)));
        for (child, indirect) in children {
            if visited.insert(child) {
                items.push(Item::Family {
                    index: child,
                    depth,
                    indirect,
                });
            }
        }
    }
    stack.extend(items.into_iter().rev());
}

fn render_tree<W: Write>(out: &mut W, timeline: &Timeline, root: usize, options: &RenderOptions) -> fmt::Result {
    let mut visited = HashSet::from([root]);
    let mut stack = Vec::new();
    push_family_members(&mut stack, timeline, root, 1);

    while let Some(item) = stack.pop() {
        match item {
            Item::Family {
                index,
                depth,
                indirect,
            } => {
                let family = &timeline.families[index];
                let marker = if indirect { "~" } else { "├─" };
                writeln!(
                    out,
                    "{}{} {} ({})",
                    "  ".repeat(depth),
                    marker,
                    family.label,
                    plural(family.len(), "span", "spans")
                )?;
                push_family_members(&mut stack, timeline, index, depth + 1);
            }
            Item::Span { index, depth } => {
                writeln!(out, "{}{}", "  ".repeat(depth), span_line(&timeline.spans[index]))?;

                if options.show_children && depth < options.max_depth {
                    push_children(&mut stack, &mut visited, timeline, &[index], depth + 1);
                }
            }
            Item::Pattern {
                family,
                pattern,
                depth,
            } => {
                let family = &timeline.families[family];
                let pattern = &family.patterns[pattern];
                writeln!(
                    out,
                    "{}↻ {}× [{}]",
                    "  ".repeat(depth),
                    pattern.repeats,
                    pattern.sequence.join(", ")
                )?;

                // Calls made from inside the loop body hang below the collapsed line
                if options.show_children && depth < options.max_depth {
                    let run = &family.spans_indices[pattern.start_span_index..pattern.end_span_index()];
                    push_children(&mut stack, &mut visited, timeline, run, depth + 1);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimelineConfig;
    use crate::event::{Position, RawEvent, TraceType};
    use crate::pipeline::build_timeline;

    fn pair(trace: &str, parent: &str, line: u32, start: u64, end: u64) -> Vec<RawEvent> {
        let pos = Position::new("main.js", line, 0);
        vec![
            RawEvent::new(trace, parent, TraceType::Enter, start, pos.clone(), pos.clone()),
            RawEvent::new(trace, parent, TraceType::Exit, end, pos.clone(), pos),
        ]
    }

    #[test]
    fn test_format_nanos() {
        assert_eq!(format_nanos(999), "999ns");
        assert_eq!(format_nanos(1_500), "1.50μs");
        assert_eq!(format_nanos(2_000_000), "2.00ms");
        assert_eq!(format_nanos(3_000_000_000), "3.000s");
    }

    #[test]
    fn test_summary_line_pluralization() {
        let timeline = build_timeline(&pair("a", "orphan-1", 1, 0, 10), &TimelineConfig::default()).unwrap();
        assert_eq!(summary_line(&timeline), "1 span, 1 family, 1 cluster, 0 errors");
    }

    #[test]
    fn test_nested_tree() {
        let mut events = pair("a", "orphan-1", 1, 0, 100);
        events.extend(pair("b", "a", 2, 10, 20));
        let timeline = build_timeline(&events, &TimelineConfig::default()).unwrap();

        let text = render_text(&timeline, &RenderOptions::default()).unwrap();
        assert!(text.contains("== cluster \"default\" =="));
        assert!(text.contains("#1 score 2  orphan-1 (1 span)"));
        assert!(text.contains("├─ main.js:1 (1 span)"));
        assert!(text.contains("main.js:2  10ns .. 20ns (10ns)"));
    }

    #[test]
    fn test_pattern_collapsed() {
        let mut events = pair("root", "orphan-1", 1, 0, 1000);
        for i in 0..4u64 {
            events.extend(pair(&format!("x{i}"), "root", 2, 10 + i * 40, 20 + i * 40));
            events.extend(pair(&format!("y{i}"), "root", 3, 30 + i * 40, 40 + i * 40));
        }
        let timeline = build_timeline(&events, &TimelineConfig::default()).unwrap();

        let text = render_text(&timeline, &RenderOptions::default()).unwrap();
        assert!(text.contains("↻ 4× [main.js:2, main.js:3]"));
        assert!(!text.contains("main.js:2  10ns"));
    }

    #[test]
    fn test_children_hidden() {
        let mut events = pair("a", "orphan-1", 1, 0, 100);
        events.extend(pair("b", "a", 2, 10, 20));
        let timeline = build_timeline(&events, &TimelineConfig::default()).unwrap();

        let options = RenderOptions {
            show_children: false,
            ..RenderOptions::default()
        };
        let text = render_text(&timeline, &options).unwrap();
        assert!(!text.contains("main.js:2"));
    }

    #[test]
    fn test_error_and_inferred_markers() {
        let pos = Position::new("main.js", 5, 0);
        let events = vec![RawEvent::new("e", "orphan-1", TraceType::Error, 50, pos.clone(), pos)];
        let timeline = build_timeline(&events, &TimelineConfig::default()).unwrap();

        let text = render_text(&timeline, &RenderOptions::default()).unwrap();
        assert!(text.contains("[error]"));
        assert!(text.contains("?50ns .. 50ns?"));
    }

    #[test]
    fn test_pattern_keeps_loop_body_calls() {
        let mut events = Vec::new();
        for i in 0..3u64 {
            let iteration = format!("it{i}");
            events.extend(pair(&iteration, "orphan-1", 2, 10 + i * 100, 90 + i * 100));
            events.extend(pair(&format!("call{i}"), &iteration, 7, 20 + i * 100, 30 + i * 100));
        }
        let timeline = build_timeline(&events, &TimelineConfig::default()).unwrap();

        let text = render_text(&timeline, &RenderOptions::default()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        let collapsed = lines.iter().position(|l| l.contains("↻ 3× [main.js:2]")).unwrap();

        // One family per iteration, each nested under the collapsed line
        let body: Vec<&&str> = lines[collapsed + 1..]
            .iter()
            .filter(|l| l.contains("├─ main.js:2 (1 span)"))
            .collect();
        assert_eq!(body.len(), 3);
        assert!(text.contains("main.js:7  20ns .. 30ns (10ns)"));
        assert!(text.contains("main.js:7  220ns .. 230ns (10ns)"));
    }
}
