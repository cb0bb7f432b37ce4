//! The Timeline aggregate and its timestamp axis
//!
//! The Timeline exclusively owns its spans and families; every cross
//! reference is an index into those arrays, so the structure serializes as-is
//! across a thread or process boundary.

use crate::family::Family;
use crate::scorer::Cluster;
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sorted, deduplicated instants plus the lookups a renderer needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampAxis {
    pub unique_timestamps: Vec<u64>,
    /// Midpoints between consecutive unique timestamps
    pub inter_timestamps: Vec<f64>,
    /// Timestamp → index in `unique_timestamps`
    pub timestamp_to_position: BTreeMap<u64, usize>,
}

impl TimestampAxis {
    /// Build the axis from every span's start and end
    ///
    /// # Example
    /// ```
    /// use tracelines::timeline::TimestampAxis;
    ///
    /// let axis = TimestampAxis::from_instants([30, 0, 10, 10, 20]);
    /// assert_eq!(axis.unique_timestamps, vec![0, 10, 20, 30]);
    /// assert_eq!(axis.inter_timestamps, vec![5.0, 15.0, 25.0]);
    /// assert_eq!(axis.position(20), Some(2));
    /// ```
    pub fn from_instants(instants: impl IntoIterator<Item = u64>) -> Self {
        let mut unique_timestamps: Vec<u64> = instants.into_iter().collect();
        unique_timestamps.sort_unstable();
        unique_timestamps.dedup();

        let inter_timestamps = unique_timestamps
            .windows(2)
            .map(|w| (w[0] as f64 + w[1] as f64) / 2.0)
            .collect();

        let timestamp_to_position = unique_timestamps
            .iter()
            .enumerate()
            .map(|(i, &ts)| (ts, i))
            .collect();

        Self {
            unique_timestamps,
            inter_timestamps,
            timestamp_to_position,
        }
    }

    pub fn from_spans(spans: &[Span]) -> Self {
        Self::from_instants(
            spans
                .iter()
                .flat_map(|s| [s.start_timestamp, s.end_timestamp]),
        )
    }

    /// Index of `timestamp` on the axis
    pub fn position(&self, timestamp: u64) -> Option<usize> {
        self.timestamp_to_position.get(&timestamp).copied()
    }
}

/// Navigable execution timeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub clusters: Vec<Cluster>,
    pub spans: Vec<Span>,
    pub families: Vec<Family>,
    pub unique_timestamps: Vec<u64>,
    pub inter_timestamps: Vec<f64>,
    pub timestamp_to_position: BTreeMap<u64, usize>,
}

impl Timeline {
    /// Assemble the final record
    pub fn assemble(clusters: Vec<Cluster>, spans: Vec<Span>, families: Vec<Family>) -> Self {
        let TimestampAxis {
            unique_timestamps,
            inter_timestamps,
            timestamp_to_position,
        } = TimestampAxis::from_spans(&spans);

        Self {
            clusters,
            spans,
            families,
            unique_timestamps,
            inter_timestamps,
            timestamp_to_position,
        }
    }

    /// Root family indices across clusters, in rendering order
    pub fn root_family_indices(&self) -> Vec<usize> {
        self.clusters
            .iter()
            .flat_map(|c| c.family_indices())
            .collect()
    }

    /// Span with the given trace id
    pub fn span_by_trace_id(&self, trace_id: &str) -> Option<(usize, &Span)> {
        self.spans
            .iter()
            .enumerate()
            .find(|(_, s)| s.trace_id == trace_id)
    }

    /// Family keyed by the given parent id
    pub fn family_by_parent_id(&self, parent_id: &str) -> Option<(usize, &Family)> {
        self.families
            .iter()
            .enumerate()
            .find(|(_, f)| f.parent_id == parent_id)
    }

    /// Spans of a family in start order
    pub fn family_spans(&self, family_index: usize) -> impl Iterator<Item = &Span> + '_ {
        self.families
            .get(family_index)
            .into_iter()
            .flat_map(move |f| f.spans_indices.iter().map(move |&i| &self.spans[i]))
    }

    pub fn error_count(&self) -> usize {
        self.spans.iter().filter(|s| s.is_error).count()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_empty() {
        let axis = TimestampAxis::from_instants(std::iter::empty());
        assert!(axis.unique_timestamps.is_empty());
        assert!(axis.inter_timestamps.is_empty());
        assert!(axis.timestamp_to_position.is_empty());
    }

    #[test]
    fn test_axis_single_instant() {
        let axis = TimestampAxis::from_instants([50, 50]);
        assert_eq!(axis.unique_timestamps, vec![50]);
        assert!(axis.inter_timestamps.is_empty());
        assert_eq!(axis.position(50), Some(0));
        assert_eq!(axis.position(51), None);
    }

    #[test]
    fn test_axis_midpoints_keep_fraction() {
        let axis = TimestampAxis::from_instants([0, 3]);
        assert_eq!(axis.inter_timestamps, vec![1.5]);
    }

    #[test]
    fn test_axis_large_timestamps() {
        let a = 1_700_000_000_000_000_000u64;
        let axis = TimestampAxis::from_instants([a, a + 1000]);
        assert_eq!(axis.inter_timestamps.len(), 1);
        assert!((axis.inter_timestamps[0] - (a as f64 + 500.0)).abs() < 1024.0);
    }

    #[test]
    fn test_timeline_serializes_camel_case() {
        let timeline = Timeline::assemble(Vec::new(), Vec::new(), Vec::new());
        let json = serde_json::to_value(&timeline).unwrap();

        assert!(json["uniqueTimestamps"].is_array());
        assert!(json["interTimestamps"].is_array());
        assert!(json["timestampToPosition"].is_object());
        assert!(json["clusters"].is_array());
        assert!(timeline.is_empty());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_timeline_json_round_trip_keeps_position_map() {
        let mut timeline = Timeline::default();
        timeline.unique_timestamps = vec![5, 9];
        timeline.timestamp_to_position = [(5, 0), (9, 1)].into_iter().collect();

        let json = serde_json::to_string(&timeline).unwrap();
        let back: Timeline = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timestamp_to_position.get(&9), Some(&1));
    }
}
