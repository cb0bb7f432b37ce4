//! Raw trace events as produced by instrumented programs
//!
//! Every instrumented expression emits one event per phase. Phases of the same
//! logical execution share a `trace_id`; `parent_id` names the trace that
//! invoked it, or an `orphan-*` id when the invoker is unknown.
//!
//! Field and variant names are part of the wire contract and must not be
//! renamed.

use serde::{Deserialize, Serialize};

/// Prefix that marks a parent id as "no known parent"
pub const DEFAULT_ORPHAN_PREFIX: &str = "orphan-";

/// Phase of a logical execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceType {
    Enter,
    Exit,
    Error,
    Normal,
    Awaited,
}

impl TraceType {
    /// Ordering rank used to break timestamp ties when sorting the phases of
    /// one trace: an Enter sorts before anything it could close.
    pub fn tie_rank(self) -> u8 {
        match self {
            TraceType::Enter => 0,
            TraceType::Normal => 1,
            TraceType::Awaited => 2,
            TraceType::Error => 3,
            TraceType::Exit => 4,
        }
    }
}

/// Source position, treated as opaque ordinals
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    pub filepath: String,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(filepath: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            filepath: filepath.into(),
            line,
            column,
        }
    }
}

/// One phase of one logical execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub trace_id: String,
    pub parent_id: String,
    pub trace_type: TraceType,
    /// Nanoseconds
    pub timestamp: u64,
    pub start_pos: Position,
    pub end_pos: Position,
}

impl RawEvent {
    /// Build an event whose start and end positions are on the same file
    ///
    /// # Example
    /// ```
    /// use tracelines::event::{Position, RawEvent, TraceType};
    ///
    /// let ev = RawEvent::new("a", "orphan-1", TraceType::Enter, 10, Position::new("app.js", 3, 0), Position::new("app.js", 5, 1));
    /// assert_eq!(ev.start_pos.filepath, "app.js");
    /// ```
    pub fn new(
        trace_id: impl Into<String>,
        parent_id: impl Into<String>,
        trace_type: TraceType,
        timestamp: u64,
        start_pos: Position,
        end_pos: Position,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            parent_id: parent_id.into(),
            trace_type,
            timestamp,
            start_pos,
            end_pos,
        }
    }
}

/// Whether `parent_id` denotes a top-level execution with no known parent
pub fn is_orphan_id(parent_id: &str, orphan_prefix: &str) -> bool {
    parent_id.is_empty() || parent_id.starts_with(orphan_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_field_names() {
        let json = r#"{
            "trace_id": "t1",
            "parent_id": "orphan-0",
            "trace_type": "Awaited",
            "timestamp": 1700000000000000000,
            "start_pos": {"filepath": "src/app.ts", "line": 12, "column": 4},
            "end_pos": {"filepath": "src/app.ts", "line": 14, "column": 1}
        }"#;

        let ev: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(ev.trace_id, "t1");
        assert_eq!(ev.trace_type, TraceType::Awaited);
        assert_eq!(ev.timestamp, 1_700_000_000_000_000_000);
        assert_eq!(ev.end_pos.line, 14);

        let back = serde_json::to_value(&ev).unwrap();
        assert_eq!(back["trace_type"], "Awaited");
        assert_eq!(back["start_pos"]["filepath"], "src/app.ts");
    }

    #[test]
    fn test_unknown_trace_type_rejected() {
        let json = r#"{"trace_id":"t","parent_id":"p","trace_type":"Begin","timestamp":0,
            "start_pos":{"filepath":"a","line":0,"column":0},
            "end_pos":{"filepath":"a","line":0,"column":0}}"#;
        assert!(serde_json::from_str::<RawEvent>(json).is_err());
    }

    #[test]
    fn test_is_orphan_id() {
        assert!(is_orphan_id("orphan-12", DEFAULT_ORPHAN_PREFIX));
        assert!(is_orphan_id("", DEFAULT_ORPHAN_PREFIX));
        assert!(!is_orphan_id("a81f", DEFAULT_ORPHAN_PREFIX));
        assert!(is_orphan_id("root:7", "root:"));
    }

    #[test]
    fn test_tie_rank_enter_first_exit_last() {
        assert!(TraceType::Enter.tie_rank() < TraceType::Error.tie_rank());
        assert!(TraceType::Error.tie_rank() < TraceType::Exit.tie_rank());
    }
}
