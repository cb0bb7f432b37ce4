//! Per-stage timing of a timeline computation
//!
//! Every successful computation returns a [`StageTimings`] next to the
//! Timeline. It is a side channel: nothing in the Timeline depends on it.

use serde::{Serialize, Serializer};
use std::time::{Duration, Instant};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Bucketing events by filepath, parent and trace
    Grouping,
    /// Resolving start/end events into spans
    SpanBuilding,
    /// Grouping spans by parent into families
    FamilyBuilding,
    /// Loop/recursion detection inside families
    PatternDetection,
    /// Direct and indirect containment
    Linking,
    /// Root scoring and clustering
    Scoring,
    /// Timestamp axis and final record
    Assembly,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Grouping,
        Stage::SpanBuilding,
        Stage::FamilyBuilding,
        Stage::PatternDetection,
        Stage::Linking,
        Stage::Scoring,
        Stage::Assembly,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Grouping => "grouping",
            Stage::SpanBuilding => "span_building",
            Stage::FamilyBuilding => "family_building",
            Stage::PatternDetection => "pattern_detection",
            Stage::Linking => "linking",
            Stage::Scoring => "scoring",
            Stage::Assembly => "assembly",
        }
    }
}

/// Wall time spent in each stage of one computation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTimings {
    /// Indexed by `Stage as usize`
    durations: [Duration; 7],
    recorded: [bool; 7],
}

impl StageTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` and charge its wall time to `stage`
    ///
    /// # Example
    /// ```
    /// use tracelines::profiling::{Stage, StageTimings};
    ///
    /// let mut timings = StageTimings::new();
    /// let n = timings.measure(Stage::Grouping, || 21 * 2);
    /// assert_eq!(n, 42);
    /// assert!(timings.get(Stage::Grouping).is_some());
    /// ```
    pub fn measure<F, R>(&mut self, stage: Stage, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(stage, start.elapsed());
        result
    }

    /// Add `duration` to a stage
    pub fn record(&mut self, stage: Stage, duration: Duration) {
        let slot = stage as usize;
        self.durations[slot] += duration;
        self.recorded[slot] = true;
    }

    /// Time spent in a stage, `None` if the stage did not run
    pub fn get(&self, stage: Stage) -> Option<Duration> {
        let slot = stage as usize;
        self.recorded[slot].then_some(self.durations[slot])
    }

    /// Stages that ran, in execution order
    pub fn iter(&self) -> impl Iterator<Item = (Stage, Duration)> + '_ {
        Stage::ALL
            .into_iter()
            .filter_map(move |stage| self.get(stage).map(|d| (stage, d)))
    }

    pub fn total(&self) -> Duration {
        self.durations.iter().sum()
    }

    /// Print the breakdown to stderr
    pub fn print_summary(&self, event_count: usize) {
        let total = self.total();

        eprintln!("\n╔════════════════════════════════════════════════════════════╗");
        eprintln!("║  Timeline Computation Timings                              ║");
        eprintln!("╚════════════════════════════════════════════════════════════╝");
        eprintln!();
        eprintln!("Events:        {}", event_count);
        eprintln!("Total time:    {:.3}ms", total.as_secs_f64() * 1000.0);
        eprintln!();
        eprintln!("Stage breakdown:");
        for (stage, time) in self.iter() {
            let share = if total.is_zero() {
                0.0
            } else {
                time.as_secs_f64() / total.as_secs_f64() * 100.0
            };
            eprintln!(
                "  - {:20} {:.3}ms ({:.1}%)",
                format!("{}:", stage.name()),
                time.as_secs_f64() * 1000.0,
                share
            );
        }
        eprintln!();
    }
}

/// Serialized as `{ "<stage>": <microseconds>, ... }`
impl Serialize for StageTimings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        for (stage, time) in self.iter() {
            map.serialize_entry(stage.name(), &(time.as_micros() as u64))?;
        }
        map.end()
    }
}
