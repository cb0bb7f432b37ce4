//! Single entry point: raw events in, Timeline out
//!
//! ```text
//! events ─► group ─► spans ─► families ─► patterns ─► link ─► score ─► assemble
//! ```
//!
//! The computation is a pure function of its input. A panic anywhere in the
//! stages is caught here and reported as [`TimelineError::Computation`]; the
//! caller never sees a partial Timeline.

use crate::config::TimelineConfig;
use crate::error::{Result, TimelineError};
use crate::event::RawEvent;
use crate::family::build_families;
use crate::grouper::group_events;
use crate::linker::link_containment;
use crate::pattern::{detect_family_patterns, LocationInterner};
use crate::profiling::{Stage, StageTimings};
use crate::scorer::{cluster_roots, rank_roots};
use crate::span::build_spans;
use crate::timeline::Timeline;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// A Timeline plus how long each stage took to build it
#[derive(Debug, Clone)]
pub struct ComputedTimeline {
    pub timeline: Timeline,
    pub timings: StageTimings,
}

/// Reconstruct the execution timeline of `events`
///
/// # Example
/// ```
/// use tracelines::config::TimelineConfig;
/// use tracelines::event::{Position, RawEvent, TraceType};
/// use tracelines::pipeline::compute_timeline;
///
/// let pos = Position::new("app.js", 1, 0);
/// let events = vec![
///     RawEvent::new("a", "orphan-1", TraceType::Enter, 0, pos.clone(), pos.clone()),
///     RawEvent::new("a", "orphan-1", TraceType::Exit, 10, pos.clone(), pos),
/// ];
///
/// let computed = compute_timeline(&events, &TimelineConfig::default()).unwrap();
/// assert_eq!(computed.timeline.spans.len(), 1);
/// assert_eq!(computed.timeline.unique_timestamps, vec![0, 10]);
/// ```
pub fn compute_timeline(events: &[RawEvent], config: &TimelineConfig) -> Result<ComputedTimeline> {
    config.validate().map_err(TimelineError::Config)?;

    panic::catch_unwind(AssertUnwindSafe(|| run_stages(events, config)))
        .map_err(|payload| TimelineError::Computation(panic_message(payload.as_ref())))
}

/// Same as [`compute_timeline`], dropping the timings
pub fn build_timeline(events: &[RawEvent], config: &TimelineConfig) -> Result<Timeline> {
    compute_timeline(events, config).map(|computed| computed.timeline)
}

fn run_stages(events: &[RawEvent], config: &TimelineConfig) -> ComputedTimeline {
    let mut timings = StageTimings::new();

    let groups = timings.measure(Stage::Grouping, || group_events(events));
    tracing::debug!(
        events = groups.event_count(),
        files = groups.file_count(),
        buckets = groups.bucket_count(),
        "Grouped events"
    );

    let mut spans = timings.measure(Stage::SpanBuilding, || build_spans(&groups));
    tracing::debug!(spans = spans.len(), "Built spans");

    let mut families = timings.measure(Stage::FamilyBuilding, || {
        build_families(&mut spans, &config.orphan_prefix)
    });
    tracing::debug!(
        families = families.len(),
        roots = families.iter().filter(|f| f.is_root).count(),
        "Built families"
    );

    if config.detect_patterns {
        let (patterns, locations) = timings.measure(Stage::PatternDetection, || {
            let mut interner = LocationInterner::new();
            let mut total = 0;
            for family in families.iter_mut() {
                family.patterns = detect_family_patterns(
                    &spans,
                    &family.spans_indices,
                    &mut interner,
                    config.max_pattern_length,
                );
                total += family.patterns.len();
            }
            (total, interner.len())
        });
        tracing::debug!(patterns, locations, "Detected patterns");
    }

    timings.measure(Stage::Linking, || {
        link_containment(&mut spans, &families, config)
    });

    let clusters = timings.measure(Stage::Scoring, || {
        let ranked = rank_roots(&spans, &families);
        cluster_roots(&spans, &families, ranked, config)
    });
    tracing::debug!(clusters = clusters.len(), "Scored root families");

    let timeline = timings.measure(Stage::Assembly, || {
        Timeline::assemble(clusters, spans, families)
    });
    tracing::debug!(
        unique_timestamps = timeline.unique_timestamps.len(),
        "Assembled timeline"
    );

    ComputedTimeline { timeline, timings }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
